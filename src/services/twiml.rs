//! TwiML documents returned to, or pushed into, Twilio.

const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Opens a bidirectional media stream back to this service, carrying the
/// call id and caller number as custom parameters.
pub fn connect_stream(host: &str, call_sid: &str, from_number: &str) -> String {
    let scheme = if is_local_host(host) { "ws" } else { "wss" };
    format!(
        "{XML_HEADER}<Response><Connect><Stream url=\"{scheme}://{host}/media-stream\">\
         <Parameter name=\"callSid\" value=\"{call_sid}\"/>\
         <Parameter name=\"fromNumber\" value=\"{from_number}\"/>\
         </Stream></Connect></Response>",
        host = escape(host),
        call_sid = escape(call_sid),
        from_number = escape(from_number),
    )
}

pub fn transfer(agent_name: &str, agent_phone: &str) -> String {
    format!(
        "{XML_HEADER}<Response><Say>Connecting you to {} now.</Say><Dial>{}</Dial></Response>",
        escape(agent_name),
        escape(agent_phone),
    )
}

fn is_local_host(host: &str) -> bool {
    let name = host.split(':').next().unwrap_or(host);
    name == "localhost" || name == "127.0.0.1"
}

pub fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
