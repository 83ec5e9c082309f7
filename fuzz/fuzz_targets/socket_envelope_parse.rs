#![no_main]

use libfuzzer_sys::fuzz_target;
use nonengagers_slack_runtime::{parse_socket_envelope_text, SlackInvocation};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let Ok(envelope) = parse_socket_envelope_text(&raw) else {
        return;
    };
    if let Ok(Some(invocation)) =
        SlackInvocation::from_envelope(&envelope, "find_non_engagers", "/nonengagers")
    {
        assert!(matches!(invocation.kind(), "shortcut" | "slash_command"));
        match &invocation {
            SlackInvocation::Shortcut { .. } => assert_eq!(envelope.envelope_type, "interactive"),
            SlackInvocation::SlashCommand { .. } => {
                assert_eq!(envelope.envelope_type, "slash_commands")
            }
        }
    }
});
