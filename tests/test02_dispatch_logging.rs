mod common;

use std::sync::Arc;

use common::{RecordingLogger, StubDriver, stub_registry};
use redis_facade::prelude::*;
use serde_json::json;

fn scripted() -> StubDriver {
    StubDriver::new("scripted")
        .reply("get", "v1".into())
        .reply("exists", Value::Bool(false))
        .reply("lrange", Value::Array(vec!["a".into(), "b".into(), "c".into()]))
        .reply("set", "OK".into())
        .reply("get_missing", Value::Nil)
}

fn logged_connection(logger: &RecordingLogger) -> Connection {
    let options = ConnectionOptions::builder()
        .driver("redis")
        .name("primary")
        .log(true)
        .finish();
    let mut conn = Connection::with_registry(options, stub_registry(scripted));
    conn.set_logger(Arc::new(logger.clone()));
    conn
}

#[test]
fn get_is_logged_with_one_affected_element() -> Result<(), RedisFacadeError> {
    let logger = RecordingLogger::default();
    let mut conn = logged_connection(&logger);

    assert_eq!(conn.invoke("get", &["k".into()])?, Value::from("v1"));

    assert_eq!(logger.len(), 1);
    let (message, context) = logger.entry(0);
    assert_eq!(message, r#"GET "k""#);
    assert_eq!(context["command"], json!("get"));
    assert_eq!(context["args"], json!(["k"]));
    assert_eq!(context["affected"], json!(1));
    assert!(context["elapsed_us"].is_u64());
    Ok(())
}

#[test]
fn false_reply_counts_as_nothing_affected() -> Result<(), RedisFacadeError> {
    let logger = RecordingLogger::default();
    let mut conn = logged_connection(&logger);

    conn.invoke("get", &["k".into()])?;
    assert_eq!(
        conn.invoke("exists", &["missing-key".into()])?,
        Value::Bool(false)
    );

    assert_eq!(logger.len(), 2);
    let (_, context) = logger.entry(1);
    assert_eq!(context["command"], json!("exists"));
    assert_eq!(context["args"], json!(["missing-key"]));
    assert_eq!(context["affected"], json!(0));
    Ok(())
}

#[test]
fn affected_count_follows_reply_shape() -> Result<(), RedisFacadeError> {
    let logger = RecordingLogger::default();
    let mut conn = logged_connection(&logger);

    conn.invoke("lrange", &["l".into(), 0.into(), (-1).into()])?;
    conn.invoke("set", &["k".into(), "v".into()])?;
    conn.invoke("get_missing", &[])?;

    let counts: Vec<_> = (0..logger.len())
        .map(|idx| logger.entry(idx).1["affected"].clone())
        .collect();
    assert_eq!(counts, vec![json!(3), json!(1), json!(1)]);
    Ok(())
}

#[test]
fn logging_disabled_returns_raw_reply_without_entries() -> Result<(), RedisFacadeError> {
    let logger = RecordingLogger::default();
    let mut conn = logged_connection(&logger);
    conn.set_logging(false);

    assert_eq!(
        conn.invoke("lrange", &["l".into()])?,
        Value::Array(vec!["a".into(), "b".into(), "c".into()])
    );
    assert_eq!(logger.len(), 0);
    Ok(())
}

#[test]
fn driver_errors_propagate_unchanged_and_are_not_logged() {
    let logger = RecordingLogger::default();
    let mut conn = logged_connection(&logger);

    match conn.invoke("flushall", &[]) {
        Err(RedisFacadeError::CommandError(message)) => {
            assert_eq!(message, "scripted cannot flushall");
        }
        other => panic!("expected the driver's error, got {other:?}"),
    }
    assert_eq!(logger.len(), 0);
}

#[test]
fn explicit_logger_is_kept() -> Result<(), RedisFacadeError> {
    let logger = RecordingLogger::default();
    let explicit: Arc<dyn Logger> = Arc::new(logger.clone());
    let mut conn = ConnectionOptions::builder().log(true).build();
    conn.set_logger(Arc::clone(&explicit));
    conn.set_driver(Box::new(scripted()));

    conn.get("k")?;
    assert!(Arc::ptr_eq(&conn.logger()?, &explicit));
    assert_eq!(logger.len(), 1);
    Ok(())
}

#[cfg(feature = "tracing")]
#[test]
fn default_logger_is_created_once_and_reused() -> Result<(), RedisFacadeError> {
    let mut conn = ConnectionOptions::builder().name("cache").log(true).build();
    conn.set_driver(Box::new(scripted()));

    conn.get("k")?;
    let first = conn.logger()?;
    conn.get("k")?;
    let second = conn.logger()?;
    assert!(Arc::ptr_eq(&first, &second));
    assert!(format!("{conn:?}").contains("logger: \"default\""));
    Ok(())
}

#[cfg(feature = "tracing")]
#[derive(Clone, Default)]
struct CapturedOutput(Arc<std::sync::Mutex<Vec<u8>>>);

#[cfg(feature = "tracing")]
impl CapturedOutput {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[cfg(feature = "tracing")]
impl std::io::Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(feature = "tracing")]
impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedOutput {
    type Writer = CapturedOutput;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(feature = "tracing")]
#[test]
fn default_logger_writes_debug_entries_under_the_query_target() -> Result<(), RedisFacadeError> {
    let output = CapturedOutput::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(output.clone())
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .without_time()
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let mut conn = ConnectionOptions::builder().name("sessions").log(true).build();
        conn.set_driver(Box::new(scripted()));
        conn.get("k").map(|_| ())
    })?;

    let text = output.text();
    let line = text
        .lines()
        .find(|line| line.contains(r#"GET "k""#))
        .unwrap_or_else(|| panic!("no query entry in {text:?}"));
    assert!(line.contains("DEBUG"), "{line}");
    assert!(line.contains("redis_facade::query"), "{line}");
    assert!(line.contains("connection=sessions"), "{line}");
    assert!(line.contains(r#""affected":1"#), "{line}");
    Ok(())
}

#[cfg(not(feature = "tracing"))]
#[test]
fn logging_without_a_backend_is_missing_logger() {
    let mut conn = ConnectionOptions::builder().log(true).build();
    conn.set_driver(Box::new(scripted()));
    assert!(matches!(
        conn.get("k"),
        Err(RedisFacadeError::MissingLogger(_))
    ));
}

#[test]
fn logging_disabled_never_builds_a_logger() -> Result<(), RedisFacadeError> {
    let mut conn = ConnectionOptions::builder().log(false).build();
    conn.set_driver(Box::new(scripted()));
    conn.get("k")?;
    assert!(format!("{conn:?}").contains("logger: \"unset\""));
    Ok(())
}

#[test]
fn cacher_is_stored_and_returned() {
    struct NullCache;
    impl Cacher for NullCache {
        fn get(&self, _key: &str) -> Option<Value> {
            None
        }
        fn set(&self, _key: &str, _value: Value) {}
        fn delete(&self, _key: &str) -> bool {
            false
        }
    }

    let mut conn = Connection::new(ConnectionOptions::new());
    assert!(conn.cacher().is_none());
    let cache: Arc<dyn Cacher> = Arc::new(NullCache);
    conn.set_cacher(Arc::clone(&cache));
    let held = conn.cacher().expect("cacher was set");
    assert!(Arc::ptr_eq(&held, &cache));
}

#[test]
fn transaction_is_forwarded_to_the_driver() -> Result<(), RedisFacadeError> {
    let logger = RecordingLogger::default();
    let mut conn = logged_connection(&logger);
    let reply = conn.transaction(|tx| {
        tx.invoke("set", &["k".into(), "v".into()])?;
        Ok(())
    })?;
    assert_eq!(reply, Value::Array(Vec::new()));
    assert_eq!(logger.len(), 0);
    let calls = conn
        .driver()?
        .downcast_ref::<StubDriver>()
        .map(|stub| stub.calls.lock().unwrap().len());
    assert_eq!(calls, Some(1));
    Ok(())
}
