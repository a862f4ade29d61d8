pub mod error;
pub mod file;

pub const DEFAULT_PORT: u16 = 8000;

pub struct AddrInfo {
    pub addr: String,
    pub port: u16,
}

impl AddrInfo {
    pub fn as_url(&self) -> String {
        format!("http://{}:{}", self.addr, self.port)
    }

    pub fn as_addr(&self) -> String {
        format!("{}:{}", self.addr, self.port)
    }

    pub fn from_env() -> Self {
        let port: u16 = match std::env::var("FILEDROP_PORT") {
            Ok(val) => val.parse().unwrap_or(DEFAULT_PORT),
            Err(_) => DEFAULT_PORT,
        };

        Self {
            addr: std::env::var("FILEDROP_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
        }
    }
}
