//! `dcc-dispatch`: dispatch one compiler invocation to a remote compile
//! host.
//!
//! This binary is a thin harness over the `dispatch` crate: it owns
//! argument parsing, acquires a local preprocessing slot, and reports the
//! dispatcher's outcome as a process exit code. Host selection, retry
//! policy, spawning the local preprocessor, and deciding whether to go
//! remote at all are left to whatever drives this binary - normally a
//! compiler-wrapper script upstream, which is expected to have already
//! produced `--preprocessed` (and set up `--file`s, for SERVER site) by
//! the time this binary runs.

use anyhow::Context;
use clap::Parser;

use cli::{HostArgs, JobArgs, Site};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dcc-dispatch",
    version,
    about = "Dispatch one compiler invocation to a remote compile host"
)]
struct Args {
    /// Compile host to connect to
    #[arg(long, help_heading = "Host")]
    host: String,

    /// TCP port on the compile host
    #[arg(long, default_value = "3632", help_heading = "Host")]
    port: u16,

    /// Tunnel command (e.g. "ssh"); when set, transport is a spawned
    /// tunnel process instead of a direct TCP connection
    #[arg(long = "tunnel-cmd", value_name = "PROGRAM", help_heading = "Host")]
    tunnel_command: Vec<String>,

    /// Remote user to pass to the tunnel command
    #[arg(long = "tunnel-user", help_heading = "Host")]
    tunnel_user: Option<String>,

    /// Which side runs the preprocessor
    #[arg(long, value_enum, default_value = "client", help_heading = "Host")]
    site: Site,

    /// Wire protocol version to advertise
    #[arg(long, default_value = "1", help_heading = "Host")]
    protocol_version: u32,

    /// Gzip-compress streamed file payloads
    #[arg(long, help_heading = "Host")]
    compression: bool,

    /// Perform the (currently no-op) authentication handshake
    #[arg(long, help_heading = "Host")]
    authenticated: bool,

    /// Input source file as passed to the compiler (e.g. `a.c`)
    #[arg(long, help_heading = "Job")]
    input: std::path::PathBuf,

    /// Preprocessed source to stream (CLIENT site only)
    #[arg(long, help_heading = "Job")]
    preprocessed: Option<std::path::PathBuf>,

    /// Additional source/header files to send (SERVER site only)
    #[arg(long = "file", help_heading = "Job")]
    files: Vec<std::path::PathBuf>,

    /// Where to write the returned object file
    #[arg(short, long, help_heading = "Job")]
    output: std::path::PathBuf,

    /// Where to write the returned dependency file, if any
    #[arg(long = "dep-output", help_heading = "Job")]
    dep_output: Option<std::path::PathBuf>,

    /// Where to write the remote compiler's stderr, if any
    #[arg(long = "stderr-output", help_heading = "Job")]
    stderr_output: Option<std::path::PathBuf>,

    /// This job is part of an LTO distribution build (suppresses GCDA
    /// staging even at CLIENT site)
    #[arg(long, help_heading = "Job")]
    lto: bool,

    /// Cap on concurrently running local preprocessors (0 = unlimited)
    #[arg(long, default_value = "0", help_heading = "Performance")]
    max_local_preprocessors: usize,

    /// Number of tokio worker threads (0 = number of CPU cores)
    #[arg(long, default_value = "0", value_name = "N", help_heading = "Performance")]
    max_workers: usize,

    /// Number of tokio blocking worker threads (0 = tokio default of 512)
    #[arg(long, default_value = "0", value_name = "N", help_heading = "Performance")]
    max_blocking_threads: usize,

    /// Verbose level: -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Output")]
    quiet: bool,

    /// The full compiler invocation, e.g. `cc -c a.i -o a.o`
    #[arg(last = true, required = true)]
    argv: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let output = common::config::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: false,
    };
    common::logging::init(&output);

    let runtime = common::config::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    let rt = builder.build().context("failed to build tokio runtime")?;

    let result = rt.block_on(async_main(args));
    // Drain staged gcda files registered during this call; this binary is
    // the process driving dispatch, so it stands in for the atexit-style
    // cleanup (see dispatch::cleanup::PROCESS_CLEANUP).
    dispatch::cleanup::PROCESS_CLEANUP.drain();
    std::process::exit(result?);
}

async fn async_main(args: Args) -> anyhow::Result<i32> {
    lock::set_max_local_preprocessors(args.max_local_preprocessors);

    let host = cli::build_host_def(&HostArgs {
        host: args.host.clone(),
        port: args.port,
        tunnel_command: args.tunnel_command.clone(),
        tunnel_user: args.tunnel_user.clone(),
        site: args.site,
        protocol_version: args.protocol_version,
        compression: args.compression,
        authenticated: args.authenticated,
    });

    let mut job = cli::build_job_descriptor(&JobArgs {
        argv: args.argv.clone(),
        input: args.input.clone(),
        preprocessed: args.preprocessed.clone(),
        files: args.files.clone(),
        output: args.output.clone(),
        dep_output: args.dep_output.clone(),
        stderr_output: args.stderr_output.clone(),
        lto: args.lto,
    });

    // Spawning the local preprocessor is the driver's job (see module docs);
    // this harness assumes `--preprocessed` already names a finished file
    // and leaves `job.cpp_child` unset, so CPP-WAIT is a no-op.
    let local_lock = lock::acquire_local_preprocess_slot().await;
    job.local_lock = Some(local_lock);

    let outcome = dispatch::dispatch(&host, job)
        .await
        .context("dispatch failed")?;

    if outcome.transport_status != 0 {
        return Ok(outcome.transport_status);
    }
    Ok(outcome.remote_wait_status.unwrap_or(0))
}
