#![no_main]

use libfuzzer_sys::fuzz_target;
use nonengagers_slack_runtime::parse_message_permalink;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    if let Some(message) = parse_message_permalink(&raw) {
        assert!(!message.channel_id.is_empty());
        let (seconds, micros) = message
            .ts
            .split_once('.')
            .expect("parsed ts always carries a dot");
        assert_eq!(micros.len(), 6);
        assert!(seconds.len() >= 10);
        assert!(seconds.chars().chain(micros.chars()).all(|c| c.is_ascii_digit()));
    }
});
