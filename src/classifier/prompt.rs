use crate::models::Record;

const INSTRUCTIONS: &str = r#"You are a security operations assistant. You receive one alert raised by an intrusion detection system.
Your task:
- Decide whether the alert is a "false_positive" or a "real_threat".
- Explain the reason for the decision in clear, technical language.
- Reply with a single line of JSON: {"class": ..., "explanation": ...}

Example:
ALERT:
{"time": 1642213952, "name": "Wazuh: ClamAV database update", "ip": "172.17.131.81", "host": "mail", "short": "W-Sys-Cav"}
Reply:
{"class": "false_positive", "explanation": "Scheduled ClamAV signature update from an internal host; legitimate maintenance activity."}

Now analyze this alert:
ALERT:
"#;

pub fn build_prompt(record: &Record) -> String {
    let alert = serde_json::to_string_pretty(record.fields())
        .unwrap_or_else(|_| record.canonical_json());
    format!("{INSTRUCTIONS}{alert}\nReply:\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_alert() {
        let record = Record::parse_line(br#"{"name":"SSH brute force","ip":"10.0.0.9"}"#).unwrap();
        let prompt = build_prompt(&record);
        assert!(prompt.contains("\"name\": \"SSH brute force\""));
        assert!(prompt.ends_with("Reply:\n"));
    }
}
