//! End-to-end boundary scenarios against a fake in-process TCP server,
//! covering S1-S6: the literal cases called out for the dispatch engine.

use dispatch::host::{HostDef, PreprocessingSite, TransportMode};
use dispatch::job::JobDescriptor;
use dispatch::wire::{tag, TokenReader, TokenWriter};

fn job(
    argv: &[&str],
    preprocessed: Option<std::path::PathBuf>,
    output_object: std::path::PathBuf,
) -> JobDescriptor {
    JobDescriptor {
        argv: argv.iter().map(|s| s.to_string()).collect(),
        input_filename: "a.i".into(),
        preprocessed_source: preprocessed,
        file_list: Vec::new(),
        output_object,
        dependency_output: None,
        server_stderr_path: None,
        cpp_child: None,
        local_lock: None,
        lto_distribution: false,
    }
}

async fn send_canned_result(writer: &mut TokenWriter<tokio::net::tcp::OwnedWriteHalf>) {
    writer.write_bytes(tag::OBJF, b"object-bytes").await.unwrap();
    writer.write_bytes(tag::ERRS, b"").await.unwrap();
    writer.write_number(tag::HDEP, 0).await.unwrap();
    writer.write_number(tag::WSTA, 0).await.unwrap();
    writer.flush().await.unwrap();
}

#[tokio::test]
async fn s1_client_no_profile_use_sends_gcda_zero() {
    let dir = tempfile::tempdir().unwrap();
    let preprocessed = dir.path().join("a.i");
    tokio::fs::write(&preprocessed, b"int main(){}").await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = sock.into_split();
        let mut reader = TokenReader::new(read_half);

        reader.read_number(tag::DIST).await.unwrap();
        let argc = reader.read_number(tag::ARGC).await.unwrap();
        assert_eq!(argc, 5);
        for expect in ["cc", "-c", "a.i", "-o", "a.o"] {
            assert_eq!(reader.read_bytes(tag::ARGV).await.unwrap(), expect.as_bytes());
        }
        let doti = reader.read_bytes(tag::DOTI).await.unwrap();
        assert_eq!(doti, b"int main(){}".to_vec());
        let gcda = reader.read_number(tag::GCDA).await.unwrap();
        assert_eq!(gcda, 0);

        let mut writer = TokenWriter::new(write_half);
        send_canned_result(&mut writer).await;
    });

    let mut host = HostDef::tcp(addr.ip().to_string(), addr.port());
    host.site = PreprocessingSite::Client;
    let cpp_child = tokio::process::Command::new("true").spawn().unwrap();
    let mut j = job(
        &["cc", "-c", "a.i", "-o", "a.o"],
        Some(preprocessed),
        dir.path().join("a.o"),
    );
    j.cpp_child = Some(cpp_child);

    let outcome = dispatch::dispatch(&host, j).await.unwrap();
    assert_eq!(outcome.transport_status, 0);
    assert_eq!(
        tokio::fs::read(dir.path().join("a.o")).await.unwrap(),
        b"object-bytes"
    );
}

#[tokio::test]
async fn s2_client_gcda_present_sends_gcda_one_and_staged_file() {
    let dir = tempfile::tempdir().unwrap();
    let preprocessed = dir.path().join("a.i");
    tokio::fs::write(&preprocessed, b"int main(){}").await.unwrap();
    // Absolute so `resolve_gcda_path` skips the cwd-mangle component, making
    // the expected staging source independent of the test process' cwd.
    let output_object = dir.path().join("a.o");

    let profile_dir = tempfile::tempdir().unwrap();
    let gcda_source = dispatch::gcda::resolve_gcda_path(
        &output_object,
        Some(profile_dir.path().to_str().unwrap()),
        std::path::Path::new("/unused"),
    );
    tokio::fs::create_dir_all(gcda_source.parent().unwrap())
        .await
        .unwrap();
    tokio::fs::write(&gcda_source, b"counters").await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = sock.into_split();
        let mut reader = TokenReader::new(read_half);

        reader.read_number(tag::DIST).await.unwrap();
        let argc = reader.read_number(tag::ARGC).await.unwrap();
        for _ in 0..argc {
            reader.read_bytes(tag::ARGV).await.unwrap();
        }
        let doti = reader.read_bytes(tag::DOTI).await.unwrap();
        assert_eq!(doti, b"int main(){}".to_vec());
        let gcda = reader.read_number(tag::GCDA).await.unwrap();
        assert_eq!(gcda, 1);
        let staged = reader.read_bytes(tag::DOTI).await.unwrap();
        assert_eq!(staged, b"counters".to_vec());

        let mut writer = TokenWriter::new(write_half);
        send_canned_result(&mut writer).await;
    });

    let mut host = HostDef::tcp(addr.ip().to_string(), addr.port());
    host.site = PreprocessingSite::Client;
    let cpp_child = tokio::process::Command::new("true").spawn().unwrap();
    let profile_arg = format!("-fprofile-use={}", profile_dir.path().display());
    let mut j = job(
        &["cc", "-c", "a.i", "-o", "a.o", profile_arg.as_str()],
        Some(preprocessed),
        output_object,
    );
    j.cpp_child = Some(cpp_child);

    let outcome = dispatch::dispatch(&host, j).await.unwrap();
    assert_eq!(outcome.transport_status, 0);
}

#[tokio::test]
async fn s3_client_gcda_absent_sends_gcda_zero_after_profile_use_request() {
    let dir = tempfile::tempdir().unwrap();
    let preprocessed = dir.path().join("a.i");
    tokio::fs::write(&preprocessed, b"int main(){}").await.unwrap();
    let output_object = dir.path().join("a.o");

    // A profile directory that exists but holds no matching `.gcda` file.
    let profile_dir = tempfile::tempdir().unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = sock.into_split();
        let mut reader = TokenReader::new(read_half);

        reader.read_number(tag::DIST).await.unwrap();
        let argc = reader.read_number(tag::ARGC).await.unwrap();
        for _ in 0..argc {
            reader.read_bytes(tag::ARGV).await.unwrap();
        }
        reader.read_bytes(tag::DOTI).await.unwrap();
        let gcda = reader.read_number(tag::GCDA).await.unwrap();
        assert_eq!(gcda, 0);

        let mut writer = TokenWriter::new(write_half);
        send_canned_result(&mut writer).await;
    });

    let mut host = HostDef::tcp(addr.ip().to_string(), addr.port());
    host.site = PreprocessingSite::Client;
    let cpp_child = tokio::process::Command::new("true").spawn().unwrap();
    let profile_arg = format!("-fprofile-use={}", profile_dir.path().display());
    let mut j = job(
        &["cc", "-c", "a.i", "-o", "a.o", profile_arg.as_str()],
        Some(preprocessed),
        output_object,
    );
    j.cpp_child = Some(cpp_child);

    let outcome = dispatch::dispatch(&host, j).await.unwrap();
    assert_eq!(outcome.transport_status, 0);
}

#[tokio::test]
async fn s4_tunnel_spawn_failure_returns_transport_error_with_no_leaks() {
    let mut host = HostDef::tcp("unused", 0);
    host.transport = TransportMode::Tunnel;
    host.tunnel_command = vec!["definitely-not-a-real-binary-xyz".to_string()];

    let dir = tempfile::tempdir().unwrap();
    let j = job(&["cc", "-c", "a.i", "-o", "a.o"], None, dir.path().join("a.o"));

    let err = dispatch::dispatch(&host, j).await.unwrap_err();
    assert!(matches!(err, dispatch::DispatchError::Transport(_)));
}

#[tokio::test]
async fn s5_cpp_failure_skips_stream_and_returns_zero_with_cpp_status() {
    let dir = tempfile::tempdir().unwrap();
    // No bytes are ever read from this connection in this scenario, but the
    // transport still needs somewhere to connect to.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = listener.accept().await;
    });

    let mut host = HostDef::tcp(addr.ip().to_string(), addr.port());
    host.site = PreprocessingSite::Client;
    let cpp_child = tokio::process::Command::new("false").spawn().unwrap();
    let mut j = job(&["cc", "-c", "a.i", "-o", "a.o"], None, dir.path().join("a.o"));
    j.cpp_child = Some(cpp_child);

    let outcome = dispatch::dispatch(&host, j).await.unwrap();
    assert_eq!(outcome.transport_status, 0);
    assert_ne!(outcome.remote_wait_status, Some(0));
    assert!(!dir.path().join("a.o").exists());
}

#[tokio::test]
async fn s6_server_site_sends_cwd_and_file_bundle_no_gcda() {
    let dir = tempfile::tempdir().unwrap();
    let x_c = dir.path().join("x.c");
    let y_h = dir.path().join("y.h");
    tokio::fs::write(&x_c, b"void f();").await.unwrap();
    tokio::fs::write(&y_h, b"// header").await.unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let (read_half, write_half) = sock.into_split();
        let mut reader = TokenReader::new(read_half);

        reader.read_number(tag::DIST).await.unwrap();
        reader.read_bytes(tag::CWD).await.unwrap();
        let argc = reader.read_number(tag::ARGC).await.unwrap();
        for _ in 0..argc {
            reader.read_bytes(tag::ARGV).await.unwrap();
        }
        let nfil = reader.read_number(tag::NFIL).await.unwrap();
        assert_eq!(nfil, 2);
        for _ in 0..nfil {
            reader.read_bytes(tag::FNAM).await.unwrap();
            reader.read_bytes(tag::DOTI).await.unwrap();
        }

        let mut writer = TokenWriter::new(write_half);
        send_canned_result(&mut writer).await;
    });

    let mut host = HostDef::tcp(addr.ip().to_string(), addr.port());
    host.site = PreprocessingSite::Server;
    let mut j = job(&["cc", "x.c"], None, dir.path().join("x.o"));
    j.file_list = vec![x_c, y_h];

    let outcome = dispatch::dispatch(&host, j).await.unwrap();
    assert_eq!(outcome.transport_status, 0);
}
