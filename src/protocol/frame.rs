use axum::extract::ws::Message as ClientMessage;
use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message as GatewayMessage;

/// A data frame on either socket, independent of the websocket library
/// that carried it.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

impl Frame {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(text) => Some(text),
            Frame::Binary(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Frame::Text(text) => text.len(),
            Frame::Binary(bin) => bin.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Frame> for GatewayMessage {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => GatewayMessage::Text(text.into()),
            Frame::Binary(bin) => GatewayMessage::Binary(bin),
        }
    }
}

impl From<Frame> for ClientMessage {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Text(text) => ClientMessage::Text(text.into()),
            Frame::Binary(bin) => ClientMessage::Binary(bin),
        }
    }
}

/// Data frames of a client socket; control frames are handed back as the error.
impl TryFrom<ClientMessage> for Frame {
    type Error = ClientMessage;

    fn try_from(msg: ClientMessage) -> Result<Self, Self::Error> {
        match msg {
            ClientMessage::Text(text) => Ok(Frame::Text(text.to_string())),
            ClientMessage::Binary(bin) => Ok(Frame::Binary(bin)),
            other => Err(other),
        }
    }
}

/// Data frames of a gateway socket; control frames are handed back as the error.
impl TryFrom<GatewayMessage> for Frame {
    type Error = GatewayMessage;

    fn try_from(msg: GatewayMessage) -> Result<Self, Self::Error> {
        match msg {
            GatewayMessage::Text(text) => Ok(Frame::Text(text.to_string())),
            GatewayMessage::Binary(bin) => Ok(Frame::Binary(bin)),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_control_frames_are_not_data() {
        assert!(Frame::try_from(ClientMessage::Ping(Bytes::new())).is_err());
        assert_eq!(
            Frame::try_from(ClientMessage::Text("hi".into())).ok(),
            Some(Frame::Text("hi".into()))
        );
    }

    #[test]
    fn gateway_messages_convert_back() {
        let msg: GatewayMessage = Frame::Text("hi".into()).into();
        assert_eq!(Frame::try_from(msg).ok(), Some(Frame::Text("hi".into())));
        assert!(Frame::try_from(GatewayMessage::Pong(Bytes::new())).is_err());
    }

    #[test]
    fn converts_to_gateway_messages() {
        let msg: GatewayMessage = Frame::Binary(Bytes::from_static(&[1, 2])).into();
        assert_eq!(msg, GatewayMessage::Binary(Bytes::from_static(&[1, 2])));
        assert_eq!(Frame::Text("abc".into()).len(), 3);
    }
}
