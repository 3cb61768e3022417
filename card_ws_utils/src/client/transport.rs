// card_ws_utils/src/client/transport.rs

//! 客户端 WebSocket 传输层核心逻辑。
//!
//! 本模块提供建立与控制服务端的连接、发送出站请求、接收原始文本帧的功能。
//! 与服务端之间的协议是纯 JSON 文本帧，没有额外的消息外壳，
//! 因此接收端只负责交付文本，不做任何解析。

use card_models::OutboundRequest;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use log::{debug, error, info};
use tokio_tungstenite::{
    WebSocketStream, connect_async,
    tungstenite::Error as TungsteniteError,
    tungstenite::protocol::Message,
};
use url::Url;

use crate::error::WsError;

/// 客户端连接成功后 `tokio-tungstenite` 返回的流类型。
pub type ClientWsStream = WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// 一个活动的客户端 WebSocket 连接，拆分为发送端与接收端。
pub struct ClientConnection {
    /// 发送端。
    pub ws_sender: SplitSink<ClientWsStream, Message>,
    /// 接收端，通常交给 [`receive_text`] 循环读取。
    pub ws_receiver: SplitStream<ClientWsStream>,
}

impl ClientConnection {
    /// 发送 Close 帧并关闭发送端。
    pub async fn close(&mut self) -> Result<(), WsError> {
        close_sender(&mut self.ws_sender).await
    }
}

/// 把出站请求序列化为 JSON 文本。
pub fn encode_request(request: &OutboundRequest) -> Result<String, WsError> {
    serde_json::to_string(request)
        .map_err(|e| WsError::SerializationError(format!("请求序列化为JSON失败: {}", e)))
}

/// 通过发送端发送一条文本帧。
pub async fn send_text(
    ws_sender: &mut SplitSink<ClientWsStream, Message>,
    text: String,
) -> Result<(), WsError> {
    debug!("客户端：准备发送文本帧: {}", text);
    ws_sender.send(Message::Text(text)).await?;
    Ok(())
}

/// 发送 Close 帧并关闭发送端。对已关闭的连接调用不视为错误。
pub async fn close_sender(ws_sender: &mut SplitSink<ClientWsStream, Message>) -> Result<(), WsError> {
    match ws_sender.close().await {
        Ok(()) => Ok(()),
        Err(TungsteniteError::ConnectionClosed) | Err(TungsteniteError::AlreadyClosed) => Ok(()),
        Err(e) => Err(WsError::WebSocketProtocolError(e)),
    }
}

/// 异步连接到指定的 WebSocket 服务器。
///
/// # Arguments
/// * `url_str` - 服务端 URL，例如 `ws://localhost:8765`。
///
/// # Returns
/// 连接与握手成功时返回拆分好的 [`ClientConnection`]；
/// URL 无效返回 `WsError::InvalidUrl`，连接或握手失败返回 `WsError::WebSocketProtocolError`。
pub async fn connect_client(url_str: &str) -> Result<ClientConnection, WsError> {
    info!("客户端：开始尝试连接到 WebSocket 服务器，URL: {}", url_str);
    let parsed_url = Url::parse(url_str)
        .map_err(|e| WsError::InvalidUrl(format!("无效的 WebSocket URL '{}': {}", url_str, e)))?;

    match connect_async(parsed_url.as_str()).await {
        Ok((ws_stream, response)) => {
            info!("客户端：已成功连接到 {} (HTTP 状态码: {})", url_str, response.status());
            let (ws_sender, ws_receiver) = ws_stream.split();
            Ok(ClientConnection { ws_sender, ws_receiver })
        }
        Err(e) => {
            error!("客户端：连接到 {} 失败，错误: {}", url_str, e);
            Err(WsError::WebSocketProtocolError(e))
        }
    }
}

/// 从接收流中读取下一条文本帧。
///
/// Ping/Pong 由底层库处理，这里直接跳过。
///
/// # Returns
/// * `Some(Ok(text))`：收到一条文本帧；
/// * `Some(Err(e))`：收到二进制帧 (`WsError::Message`，连接仍可用) 或发生底层错误；
/// * `None`：连接已关闭 (Close 帧、流结束或 `ConnectionClosed`)。
pub async fn receive_text(ws_receiver: &mut SplitStream<ClientWsStream>) -> Option<Result<String, WsError>> {
    loop {
        match ws_receiver.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!("客户端：收到原始文本消息，内容: '{}'", text);
                break Some(Ok(text));
            }
            Some(Ok(Message::Binary(bin))) => {
                debug!("客户端：收到二进制消息，长度: {} 字节", bin.len());
                break Some(Err(WsError::Message("客户端收到了非预期的 WebSocket 二进制消息".to_string())));
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {
                // 控制帧，继续等待业务消息
            }
            Some(Ok(Message::Close(close_frame))) => {
                debug!("客户端：收到 Close 控制帧，详细信息: {:?}", close_frame);
                break None;
            }
            Some(Err(TungsteniteError::ConnectionClosed)) | Some(Err(TungsteniteError::AlreadyClosed)) => {
                debug!("客户端：连接已关闭 (ConnectionClosed / AlreadyClosed)。");
                break None;
            }
            Some(Err(e)) => {
                error!("客户端：从 WebSocket 流接收消息时发生底层错误: {}", e);
                break Some(Err(WsError::WebSocketProtocolError(e)));
            }
            None => {
                debug!("客户端：WebSocket 接收流已结束。");
                break None;
            }
        }
    }
}

/// 判断一次接收错误之后连接是否仍然可用。
///
/// 二进制帧之类的应用层错误不影响连接；协议或 I/O 错误意味着连接已不可用。
pub fn is_fatal(error: &WsError) -> bool {
    !matches!(error, WsError::Message(_))
}
