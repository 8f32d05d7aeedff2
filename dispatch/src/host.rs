/// How the transport to a compile host is established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMode {
    /// A plain TCP connection to `hostname:port`.
    Tcp,
    /// A pair of pipes bound to a spawned tunnel child process.
    Tunnel,
}

/// Which side runs the C preprocessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreprocessingSite {
    /// The client produces `.i` and ships the preprocessed source.
    Client,
    /// The client ships raw sources and headers; the server preprocesses.
    Server,
}

/// A candidate compile host, immutable for the duration of one dispatch call.
#[derive(Debug, Clone)]
pub struct HostDef {
    pub transport: TransportMode,
    pub hostname: String,
    pub port: u16,
    /// User to pass to the tunnel command, when `transport == Tunnel`.
    pub tunnel_user: Option<String>,
    /// Argv of the tunnel command, e.g. `["ssh"]` or a custom wrapper script.
    /// The hostname (and user, if any) are appended by [`crate::transport::open_transport`].
    pub tunnel_command: Vec<String>,
    pub site: PreprocessingSite,
    pub protocol_version: u32,
    pub compression: bool,
    pub authenticated: bool,
}

impl HostDef {
    /// A TCP host with no authentication, client-side preprocessing, and no
    /// compression - the common case in tests and simple configurations.
    pub fn tcp(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            transport: TransportMode::Tcp,
            hostname: hostname.into(),
            port,
            tunnel_user: None,
            tunnel_command: Vec::new(),
            site: PreprocessingSite::Client,
            protocol_version: 1,
            compression: false,
            authenticated: false,
        }
    }
}
