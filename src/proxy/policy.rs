//! Location matching policy: bingo highlighting and scan-wide stop

use crate::proxy::models::{ProxyRecord, ProxyType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Outcome of evaluating one successful check against the location sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    /// Cease admitting further checks and terminate the scan
    Halt,
}

/// Shared scan-wide halt signal.
///
/// Raised when a stop location matches; the checker consults it before
/// admitting each new check. In-flight checks are left to finish. This is an
/// ordinary, expected termination, not an error.
#[derive(Debug, Clone, Default)]
pub struct HaltFlag(Arc<AtomicBool>);

impl HaltFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn halt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Operator-supplied location sets matched as substrings against the
/// canonical `host:port|country|region|city|ip` descriptor.
#[derive(Debug, Clone, Default)]
pub struct LocationPolicy {
    bingo: Vec<String>,
    stop: Vec<String>,
}

impl LocationPolicy {
    pub fn new(bingo: Vec<String>, stop: Vec<String>) -> Self {
        Self { bingo, stop }
    }

    /// Log the result for one classified record and decide whether the scan
    /// continues. Stop locations are checked independently of the bingo
    /// outcome, after it.
    pub fn evaluate(&self, record: &ProxyRecord, proto: ProxyType) -> Decision {
        let name = record.as_str(true);

        if self.bingo.iter().any(|v| name.contains(v.as_str())) {
            info!("---------- BINGO!!! ----------");
            info!("PROXY({}): {}", proto.label(), name);
            info!("------------------------------");
        } else {
            info!("PROXY({}): {}", proto.label(), name);
        }

        if self.stop.iter().any(|v| name.contains(v.as_str())) {
            info!("FOUND!!!");
            return Decision::Halt;
        }
        Decision::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::Mutex;
    use tracing_subscriber::fmt::MakeWriter;

    fn classified_record() -> ProxyRecord {
        let mut record = ProxyRecord::new("1.2.3.4".to_string(), 8080);
        record.geolocation = Some("|US|California|LA|1.2.3.4".to_string());
        record
    }

    /// Collects log output so tests can assert on the emitted lines
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Capture {
        type Writer = Capture;

        fn make_writer(&'a self) -> Capture {
            self.clone()
        }
    }

    fn with_captured_logs(f: impl FnOnce()) -> String {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(capture.clone())
            .without_time()
            .with_level(false)
            .with_target(false)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let output = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
        output
    }

    #[test]
    fn test_bingo_match_continues() {
        let policy = LocationPolicy::new(vec!["California".to_string()], vec![]);
        let decision = policy.evaluate(&classified_record(), ProxyType::Socks5);
        assert_eq!(decision, Decision::Continue);
    }

    #[test]
    fn test_bingo_match_emits_highlighted_block() {
        let policy = LocationPolicy::new(vec!["California".to_string()], vec![]);
        let record = classified_record();
        let output = with_captured_logs(|| {
            policy.evaluate(&record, ProxyType::Socks5);
        });
        assert_eq!(
            output.lines().collect::<Vec<_>>(),
            vec![
                "---------- BINGO!!! ----------",
                "PROXY(SOCKS5): 1.2.3.4:8080|US|California|LA|1.2.3.4",
                "------------------------------",
            ]
        );
    }

    #[test]
    fn test_plain_result_emits_single_line() {
        let policy = LocationPolicy::default();
        let record = classified_record();
        let output = with_captured_logs(|| {
            policy.evaluate(&record, ProxyType::Http);
        });
        assert_eq!(
            output.lines().collect::<Vec<_>>(),
            vec!["PROXY(HTTP): 1.2.3.4:8080|US|California|LA|1.2.3.4"]
        );
    }

    #[test]
    fn test_stop_match_halts() {
        let policy = LocationPolicy::new(vec![], vec!["US".to_string()]);
        let decision = policy.evaluate(&classified_record(), ProxyType::Socks5);
        assert_eq!(decision, Decision::Halt);
    }

    #[test]
    fn test_stop_match_logs_found() {
        let policy = LocationPolicy::new(vec![], vec!["US".to_string()]);
        let record = classified_record();
        let output = with_captured_logs(|| {
            assert_eq!(policy.evaluate(&record, ProxyType::Socks5), Decision::Halt);
        });
        assert!(output.lines().any(|line| line == "FOUND!!!"));
    }

    #[test]
    fn test_stop_halts_regardless_of_bingo() {
        let policy = LocationPolicy::new(
            vec!["California".to_string()],
            vec!["US".to_string()],
        );
        let decision = policy.evaluate(&classified_record(), ProxyType::Http);
        assert_eq!(decision, Decision::Halt);
    }

    #[test]
    fn test_empty_sets_continue() {
        let policy = LocationPolicy::default();
        let decision = policy.evaluate(&classified_record(), ProxyType::Socks4);
        assert_eq!(decision, Decision::Continue);
    }

    #[test]
    fn test_substring_matches_host_and_port_too() {
        // The whole descriptor is matched, endpoint included
        let policy = LocationPolicy::new(vec![], vec!["1.2.3.4:8080".to_string()]);
        let decision = policy.evaluate(&classified_record(), ProxyType::Socks5);
        assert_eq!(decision, Decision::Halt);
    }

    #[test]
    fn test_halt_flag_is_shared() {
        let flag = HaltFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_halted());
        flag.halt();
        assert!(clone.is_halted());
    }
}
