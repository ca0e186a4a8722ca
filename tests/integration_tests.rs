use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use nxcrunner::parser::{parse_report, parse_report_file, Detections};
use nxcrunner::rules::RuleSet;
use nxcrunner::runner::Runner;

// Tests that drive Runner::run share the process-wide interrupt flag, so
// they must not overlap.
static RUN_LOCK: Mutex<()> = Mutex::new(());

fn parse(input: &str) -> Detections {
    parse_report(input.as_bytes(), &RuleSet::new())
}

#[test]
fn test_service_name_detection() {
    let detections = parse("445/tcp open microsoft-ds\n");
    assert_eq!(detections.ports("smb"), Some(vec![445]));
}

#[test]
fn test_port_and_service_overlap_deduplicated() {
    let detections = parse("3389/tcp open ms-wbt-server\n");
    assert_eq!(detections.ports("rdp"), Some(vec![3389]));
    assert_eq!(detections.pair_count(), 1);
}

#[test]
fn test_version_fingerprint_detection() {
    let detections = parse("5985/tcp open http Microsoft HTTPAPI httpd 2.0\n");
    assert_eq!(detections.ports("winrm"), Some(vec![5985]));
}

#[test]
fn test_version_matching_requires_free_text() {
    // Plain "http" with no banner: nothing to fingerprint, and neither the
    // port nor service table knows 8080/http.
    let detections = parse("8080/tcp open http\n");
    assert!(detections.is_empty());
}

#[test]
fn test_unmapped_lines_produce_no_entries() {
    let detections = parse("21/tcp open ftp\n22/tcp open ssh\n");
    assert_eq!(detections.ports("ftp"), Some(vec![21]));
    assert_eq!(detections.protocol_count(), 1);
}

#[test]
fn test_report_noise_is_skipped() {
    let report = "\
# Nmap 7.94 scan initiated
Nmap scan report for 10.0.0.5
PORT     STATE    SERVICE       VERSION
135/tcp  filtered msrpc
445/udp  open     microsoft-ds
3389/tcp closed   ms-wbt-server

Service detection performed.
";
    assert!(parse(report).is_empty());
}

#[test]
fn test_admission_shaped_line_with_bad_port_is_skipped() {
    let detections = parse("4294967296/tcp open microsoft-ds\n445/tcp open microsoft-ds\n");
    assert_eq!(detections.ports("smb"), Some(vec![445]));
}

#[test]
fn test_ports_ascending_within_protocol() {
    let report = "\
5986/tcp open wsmans
445/tcp  open microsoft-ds
5985/tcp open http Microsoft HTTPAPI httpd 2.0
";
    let detections = parse(report);
    assert_eq!(detections.ports("winrm"), Some(vec![5985, 5986]));
    assert_eq!(detections.ports("smb"), Some(vec![445]));
}

#[test]
fn test_one_line_can_hit_multiple_protocols() {
    // Port table says wmi, service table says smb for the same line.
    let detections = parse("135/tcp open microsoft-ds\n");
    assert_eq!(detections.ports("wmi"), Some(vec![135]));
    assert_eq!(detections.ports("smb"), Some(vec![135]));
}

#[test]
fn test_parse_report_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "445/tcp open microsoft-ds").unwrap();
    writeln!(file, "2049/tcp open nfs").unwrap();

    let rules = RuleSet::new();
    let detections = parse_report_file(file.path(), &rules).unwrap();
    assert_eq!(detections.ports("smb"), Some(vec![445]));
    assert_eq!(detections.ports("nfs"), Some(vec![2049]));
}

#[test]
fn test_unreadable_report_is_fatal() {
    let rules = RuleSet::new();
    assert!(parse_report_file(Path::new("/no/such/report.txt"), &rules).is_err());
}

#[test]
fn test_detections_serialize_to_json() {
    let detections = parse("445/tcp open microsoft-ds\n5985/tcp open http Microsoft HTTPAPI\n");
    let json: serde_json::Value =
        serde_json::from_str(&serde_json::to_string(&detections).unwrap()).unwrap();
    assert_eq!(json["smb"], serde_json::json!([445]));
    assert_eq!(json["winrm"], serde_json::json!([5985]));
}

#[test]
fn test_extra_command_tokenization() {
    let runner = Runner::new("nxc", "10.0.0.5", Some("-u 'guest' -p ''")).unwrap();
    assert_eq!(runner.extra_args(), ["-u", "guest", "-p", ""]);
}

#[test]
fn test_launch_failure_does_not_halt_matrix() {
    let _guard = RUN_LOCK.lock().unwrap();
    let detections = parse("445/tcp open microsoft-ds\n2049/tcp open nfs\n");
    let runner = Runner::new("/nonexistent/credential-tool", "127.0.0.1", None).unwrap();

    let summary = runner.run(&detections);
    assert_eq!(summary.failures, 2);
    assert_eq!(summary.completed, 0);
    assert!(!summary.cancelled);
}

#[test]
fn test_empty_matrix_still_completes_normally() {
    let _guard = RUN_LOCK.lock().unwrap();
    let detections = parse("");
    let runner = Runner::new("nxc", "127.0.0.1", None).unwrap();

    let summary = runner.run(&detections);
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.terminated, 0);
    assert_eq!(summary.failures, 0);
    assert!(!summary.cancelled);
}

#[cfg(unix)]
#[test]
fn test_interrupt_kills_child_and_continues() {
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    let _guard = RUN_LOCK.lock().unwrap();

    // Fake collaborator: hangs on the nfs invocation, exits at once for smb.
    // argv is <proto> <host> --port <port>.
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("fake-nxc");
    std::fs::write(
        &script,
        "#!/bin/sh\nif [ \"$1\" = \"nfs\" ]; then sleep 30; fi\nexit 0\n",
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    // nfs sorts before smb, so the hanging invocation runs first.
    let detections = parse("2049/tcp open nfs\n445/tcp open microsoft-ds\n");
    let runner = Runner::new(script.to_str().unwrap(), "127.0.0.1", None).unwrap();

    let ticker = std::thread::spawn(|| {
        std::thread::sleep(Duration::from_millis(500));
        nxcrunner::interrupt::raise();
    });

    let summary = runner.run(&detections);
    ticker.join().unwrap();

    assert_eq!(summary.terminated, 1);
    assert_eq!(summary.completed, 1);
    assert!(!summary.cancelled);
}

#[cfg(unix)]
#[test]
fn test_pending_interrupt_at_top_level_cancels_run() {
    let _guard = RUN_LOCK.lock().unwrap();
    let detections = parse("445/tcp open microsoft-ds\n");
    let runner = Runner::new("/bin/true", "127.0.0.1", None).unwrap();

    nxcrunner::interrupt::raise();
    let summary = runner.run(&detections);

    assert!(summary.cancelled);
    assert_eq!(summary.completed, 0);
}

#[cfg(unix)]
#[test]
fn test_sigint_before_any_invocation_cancels_instead_of_killing() {
    let _guard = RUN_LOCK.lock().unwrap();

    // With the handler installed (as main does before parsing), a real
    // SIGINT arriving while no child runs must not kill the process; it
    // becomes a top-level cancellation of the run.
    nxcrunner::interrupt::install();
    unsafe {
        libc::kill(std::process::id() as libc::pid_t, libc::SIGINT);
    }
    // Delivery may land on another thread; give it a moment.
    std::thread::sleep(std::time::Duration::from_millis(50));

    let detections = parse("445/tcp open microsoft-ds\n");
    let runner = Runner::new("/bin/true", "127.0.0.1", None).unwrap();
    let summary = runner.run(&detections);

    assert!(summary.cancelled);
    assert_eq!(summary.completed, 0);
}
