//! TwiML for the call-setup webhook.
//!
//! Twilio fetches this document when a call arrives. It greets the caller and
//! then connects the call audio to our `/media-stream` WebSocket.

use quick_xml::escape::escape;

/// Path of the Media Stream WebSocket endpoint.
pub const MEDIA_STREAM_PATH: &str = "/media-stream";

/// What the caller hears before the stream is connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallScript {
    pub intro_message: String,
    pub pause_seconds: u32,
    pub ready_message: String,
}

/// Build the `<Response>` document connecting the call to `stream_url`.
///
/// Empty messages and a zero pause are left out of the document.
pub fn connect_stream_twiml(script: &CallScript, stream_url: &str) -> String {
    let mut twiml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);

    if !script.intro_message.trim().is_empty() {
        twiml.push_str(&format!("<Say>{}</Say>", escape(&script.intro_message)));
    }
    if script.pause_seconds > 0 {
        twiml.push_str(&format!(r#"<Pause length="{}"/>"#, script.pause_seconds));
    }
    if !script.ready_message.trim().is_empty() {
        twiml.push_str(&format!("<Say>{}</Say>", escape(&script.ready_message)));
    }

    twiml.push_str(&format!(
        r#"<Connect><Stream url="{}"/></Connect></Response>"#,
        escape(stream_url)
    ));
    twiml
}

/// `wss://` URL of the media stream endpoint on `host`.
pub fn media_stream_url(host: &str) -> String {
    format!("wss://{host}{MEDIA_STREAM_PATH}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> CallScript {
        CallScript {
            intro_message: "Please wait while we connect your call.".to_string(),
            pause_seconds: 1,
            ready_message: "O.K. you can start talking!".to_string(),
        }
    }

    #[test]
    fn test_connect_stream_twiml() {
        let twiml = connect_stream_twiml(&script(), &media_stream_url("example.ngrok.app"));
        assert_eq!(
            twiml,
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#,
                "<Say>Please wait while we connect your call.</Say>",
                r#"<Pause length="1"/>"#,
                "<Say>O.K. you can start talking!</Say>",
                r#"<Connect><Stream url="wss://example.ngrok.app/media-stream"/></Connect>"#,
                "</Response>"
            )
        );
    }

    #[test]
    fn test_optional_parts_omitted() {
        let script = CallScript {
            intro_message: String::new(),
            pause_seconds: 0,
            ready_message: " ".to_string(),
        };
        let twiml = connect_stream_twiml(&script, "wss://h/media-stream");
        assert!(!twiml.contains("<Say>"));
        assert!(!twiml.contains("<Pause"));
        assert!(twiml.contains(r#"<Stream url="wss://h/media-stream"/>"#));
    }

    #[test]
    fn test_messages_are_escaped() {
        let script = CallScript {
            intro_message: "Tom & Jerry <say> \"hi\"".to_string(),
            ..script()
        };
        let twiml = connect_stream_twiml(&script, "wss://h/media-stream");
        assert!(twiml.contains("<Say>Tom &amp; Jerry &lt;say&gt; &quot;hi&quot;</Say>"));
    }

    #[test]
    fn test_stream_url_is_escaped() {
        let twiml = connect_stream_twiml(&script(), "wss://h/media-stream?a=1&b=\"2\"");
        assert!(twiml.contains(
            r#"<Stream url="wss://h/media-stream?a=1&amp;b=&quot;2&quot;"/>"#
        ));
    }
}
