//! Argument translation for the `dcc-dispatch` binary: turns parsed CLI
//! flags into the `dispatch` crate's `HostDef`/`JobDescriptor` pair.
//!
//! Argument parsing itself, host selection policy, and spawning the local
//! preprocessor are the caller's job (normally a compiler-wrapper driver
//! upstream of this binary) - this crate only owns the translation and the
//! glue that invokes the dispatcher.

use std::path::PathBuf;

use dispatch::{HostDef, JobDescriptor, PreprocessingSite, TransportMode};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum Site {
    Client,
    Server,
}

impl From<Site> for PreprocessingSite {
    fn from(site: Site) -> Self {
        match site {
            Site::Client => PreprocessingSite::Client,
            Site::Server => PreprocessingSite::Server,
        }
    }
}

/// The subset of parsed CLI flags needed to build a [`HostDef`]. Kept
/// separate from `clap`'s `Args` struct so it can be constructed directly
/// in tests without going through argument parsing.
#[derive(Debug, Clone)]
pub struct HostArgs {
    pub host: String,
    pub port: u16,
    pub tunnel_command: Vec<String>,
    pub tunnel_user: Option<String>,
    pub site: Site,
    pub protocol_version: u32,
    pub compression: bool,
    pub authenticated: bool,
}

pub fn build_host_def(args: &HostArgs) -> HostDef {
    let transport = if args.tunnel_command.is_empty() {
        TransportMode::Tcp
    } else {
        TransportMode::Tunnel
    };
    HostDef {
        transport,
        hostname: args.host.clone(),
        port: args.port,
        tunnel_user: args.tunnel_user.clone(),
        tunnel_command: args.tunnel_command.clone(),
        site: args.site.into(),
        protocol_version: args.protocol_version,
        compression: args.compression,
        authenticated: args.authenticated,
    }
}

/// The subset of parsed CLI flags needed to build a [`JobDescriptor`].
#[derive(Debug, Clone)]
pub struct JobArgs {
    pub argv: Vec<String>,
    pub input: PathBuf,
    pub preprocessed: Option<PathBuf>,
    pub files: Vec<PathBuf>,
    pub output: PathBuf,
    pub dep_output: Option<PathBuf>,
    pub stderr_output: Option<PathBuf>,
    pub lto: bool,
}

/// Build the job descriptor. `cpp_child` is attached separately by the
/// caller once it has spawned the local preprocessor, and `local_lock` once
/// it has acquired a slot - neither is argument-parsing's concern.
pub fn build_job_descriptor(args: &JobArgs) -> JobDescriptor {
    JobDescriptor {
        argv: args.argv.clone(),
        input_filename: args.input.clone(),
        preprocessed_source: args.preprocessed.clone(),
        file_list: args.files.clone(),
        output_object: args.output.clone(),
        dependency_output: args.dep_output.clone(),
        server_stderr_path: args.stderr_output.clone(),
        cpp_child: None,
        local_lock: None,
        lto_distribution: args.lto,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_args() -> HostArgs {
        HostArgs {
            host: "buildhost".into(),
            port: 3632,
            tunnel_command: Vec::new(),
            tunnel_user: None,
            site: Site::Client,
            protocol_version: 1,
            compression: false,
            authenticated: false,
        }
    }

    #[test]
    fn empty_tunnel_command_means_tcp() {
        let host = build_host_def(&host_args());
        assert_eq!(host.transport, TransportMode::Tcp);
    }

    #[test]
    fn nonempty_tunnel_command_means_tunnel() {
        let mut args = host_args();
        args.tunnel_command = vec!["ssh".into()];
        let host = build_host_def(&args);
        assert_eq!(host.transport, TransportMode::Tunnel);
    }

    #[test]
    fn job_descriptor_carries_argv_and_paths() {
        let args = JobArgs {
            argv: vec!["cc".into(), "-c".into(), "a.i".into()],
            input: "a.c".into(),
            preprocessed: Some("a.i".into()),
            files: Vec::new(),
            output: "a.o".into(),
            dep_output: None,
            stderr_output: None,
            lto: false,
        };
        let job = build_job_descriptor(&args);
        assert_eq!(job.argv, args.argv);
        assert_eq!(job.output_object, args.output);
        assert!(job.cpp_child.is_none());
        assert!(job.local_lock.is_none());
    }
}
