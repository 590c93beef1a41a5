//! Wire formatting for one SSE line (spec §6.1): `event: <type>\ndata: <json>\n\n`.

use crate::event::Event;

/// Renders one event as a complete SSE frame, UTF-8, terminated by a blank line.
pub fn to_sse_frame(event: &Event) -> Result<String, serde_json::Error> {
    let value = event.to_value()?;
    let type_name = value
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("message")
        .to_string();
    let data = serde_json::to_string(&value)?;
    Ok(format!("event: {type_name}\ndata: {data}\n\n"))
}
