//! Message formatting utilities for client display.

use hiroba_server::infrastructure::dto::wire::MessageFrame;
use hiroba_shared::time::timestamp_to_rfc3339;

/// Message formatter for client display
pub struct MessageFormatter;

impl MessageFormatter {
    /// Format a relayed message
    ///
    /// # Arguments
    ///
    /// * `frame` - The frame received from the server
    ///
    /// # Returns
    ///
    /// A formatted string with sender, body and relay time
    pub fn format_message(frame: &MessageFrame) -> String {
        let sender = match frame.sender {
            Some(id) => format!("conn-{}", id),
            None => "unknown".to_string(),
        };
        let relayed_at = match frame.server_timestamp {
            Some(timestamp) => timestamp_to_rfc3339(timestamp),
            None => "-".to_string(),
        };
        format!("\n[{}] {}: {}\n", relayed_at, sender, frame.body)
    }

    /// Format the confirmation shown after a message is sent
    pub fn format_sent_confirmation(client_timestamp: i64) -> String {
        format!("(sent at {})\n", timestamp_to_rfc3339(client_timestamp))
    }

    pub fn format_body_too_long(len: usize, max: usize) -> String {
        format!("Message not sent: {} bytes exceeds the {} byte limit\n", len, max)
    }
}
