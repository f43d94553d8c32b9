pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4321;
pub const BOUNDED_CHANNEL_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    // capacity of the queue feeding the router
    pub queue_size: usize,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ServerConfig { host: host.into(), port, ..Default::default() }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            queue_size: BOUNDED_CHANNEL_SIZE,
        }
    }
}
