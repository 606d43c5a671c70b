#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use async_trait::async_trait;
use dbreach::{
    bindings::{Credentials, ServiceBinding},
    config::ConfigSource,
    drivers::{BoxError, Connection, Driver, DriverCatalog},
    registry::SharedRegistry,
};
use std::{
    env,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::{Duration, Instant, sleep},
};

pub const MARIADB_URL: &str = "jdbc:mariadb://localhost:3306/testdb";
pub const MYSQL_URL: &str = "jdbc:mysql://localhost:3306/testdb";
pub const POSTGRES_URL: &str = "jdbc:postgresql://localhost:5432/testdb";
pub const MARIADB_USER: &str = "dbreach";
pub const POSTGRES_USER: &str = "postgres";
pub const DB_PASSWORD: &str = "secret";

pub fn skip_if_no_postgres() -> bool {
    env::var("SKIP_POSTGRES_TESTS").is_ok()
}

pub fn skip_if_no_mariadb() -> bool {
    env::var("SKIP_MARIADB_TESTS").is_ok()
}

/// Connector configuration used by the mock tests, `mock` resolves to [`MockCatalog`]
pub const MOCK_CONFIG: &str = r#"{"connectors":[
    {"url_scheme":"db2","display_name":"DB2","driver":"mock","query":"SELECT current date FROM sysibm.sysdummy1"},
    {"url_scheme":"mysql","display_name":"MySQL","driver":"mock","query":"SELECT current_date"},
    {"url_scheme":"informix","display_name":"Informix","driver":"informix-jdbc","query":"SELECT 1"}
]}"#;

pub fn mock_registry() -> SharedRegistry {
    SharedRegistry::new(ConfigSource::Inline(MOCK_CONFIG.to_string()))
}

/// Registry backed by the shipped `rdbms_config.json`
pub fn shipped_registry() -> SharedRegistry {
    SharedRegistry::new(ConfigSource::File(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("rdbms_config.json"),
    ))
}

pub fn binding(name: &str, url: Option<&str>) -> ServiceBinding {
    ServiceBinding {
        name: name.to_string(),
        credentials: Some(Credentials {
            jdbcurl: url.map(str::to_string),
            user: Some("tester".to_string()),
            password: Some("secret".to_string()),
        }),
    }
}

#[derive(Default)]
pub struct Calls {
    pub opened: AtomicUsize,
    pub queried: AtomicUsize,
    pub closed: AtomicUsize,
    pub queries: Mutex<Vec<String>>,
}

impl Calls {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn queried(&self) -> usize {
        self.queried.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

/// How a [`MockCatalog`] connection behaves, picked from the URL host
///
/// `jdbc:x://refused/..` fails to connect, `empty` returns no row, `broken` fails the
/// query, `panic` panics inside the query, anything else returns the configured value.
pub struct MockCatalog {
    driver: Arc<MockDriver>,
    pub calls: Arc<Calls>,
}

impl MockCatalog {
    pub fn returning(value: &str) -> Self {
        let calls = Arc::new(Calls::default());
        Self {
            driver: Arc::new(MockDriver {
                value: value.to_string(),
                calls: Arc::clone(&calls),
            }),
            calls,
        }
    }
}

impl DriverCatalog for MockCatalog {
    fn resolve(&self, driver_id: &str) -> Option<Arc<dyn Driver>> {
        (driver_id == "mock").then(|| Arc::clone(&self.driver) as Arc<dyn Driver>)
    }
}

struct MockDriver {
    value: String,
    calls: Arc<Calls>,
}

#[async_trait]
impl Driver for MockDriver {
    async fn open(
        &self,
        url: &str,
        _user: Option<&str>,
        _password: Option<&str>,
    ) -> Result<Box<dyn Connection>, BoxError> {
        let host = url
            .split_once("://")
            .and_then(|(_, rest)| rest.split(['/', ':', ';']).next())
            .unwrap_or_default()
            .to_string();

        if host == "refused" {
            return Err("Connection refused (os error 111)".into());
        }

        self.calls.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            host,
            value: self.value.clone(),
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct MockConnection {
    host: String,
    value: String,
    calls: Arc<Calls>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn fetch_first_value(&mut self, query: &str) -> Result<Option<String>, BoxError> {
        self.calls.queried.fetch_add(1, Ordering::SeqCst);
        self.calls.queries.lock().unwrap().push(query.to_string());

        match self.host.as_str() {
            "empty" => Ok(None),
            "broken" => Err("SQL0204N  \"SYSIBM.SYSDUMMY1\" is an undefined name".into()),
            "panic" => panic!("driver bug"),
            _ => Ok(Some(self.value.clone())),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), BoxError> {
        self.calls.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn pick_free_port() -> u16 {
    std::net::TcpListener::bind(("127.0.0.1", 0))
        .expect("failed to bind random local port")
        .local_addr()
        .expect("failed to read local addr")
        .port()
}

pub fn dbreach_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_dbreach"))
}

/// Plain HTTP/1.1 GET returning the response body
pub async fn http_get(port: u16, path: &str) -> Option<String> {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.ok()?;
    let request =
        format!("GET {path} HTTP/1.1\r\nHost: 127.0.0.1:{port}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.ok()?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.ok()?;
    let response = String::from_utf8(response).ok()?;
    let (_, body) = response.split_once("\r\n\r\n")?;
    Some(body.to_string())
}

pub async fn wait_for_http(port: u16, path: &str, timeout: Duration) -> Option<String> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(body) = http_get(port, path).await {
            return Some(body);
        }

        if Instant::now() >= deadline {
            return None;
        }

        sleep(Duration::from_millis(100)).await;
    }
}

/// Unique temp file path for a test
pub fn temp_path(test_name: &str, extension: &str) -> PathBuf {
    env::temp_dir().join(format!(
        "dbreach_{test_name}_{}.{extension}",
        std::process::id()
    ))
}
