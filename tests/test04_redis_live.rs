#![cfg(feature = "redis")]

//! Runs against a real server only when `REDIS_FACADE_TEST_URL` is set, e.g.
//! `REDIS_FACADE_TEST_URL=redis://127.0.0.1:6379/15`.

use redis_facade::prelude::*;

fn live_connection() -> Option<Connection> {
    let url = std::env::var("REDIS_FACADE_TEST_URL").ok()?;
    Some(
        ConnectionOptions::builder()
            .driver("redis")
            .name("live")
            .option("url", url)
            .option("timeout", 2.0)
            .build(),
    )
}

#[test]
fn live_round_trip() -> Result<(), RedisFacadeError> {
    let Some(mut conn) = live_connection() else {
        eprintln!("REDIS_FACADE_TEST_URL not set, skipping");
        return Ok(());
    };
    let key = format!("redis-facade:test:{}", std::process::id());

    assert_eq!(conn.ping()?, Value::from("PONG"));
    conn.set(&key, "v1")?;
    assert_eq!(conn.get(&key)?, Value::from("v1"));
    assert!(conn.exists(&key)?);
    assert_eq!(conn.driver()?.type_name(), "Redis/Driver/Redis");
    assert!(conn.driver()?.is::<RedisDriver>());

    let replies = conn.transaction(|tx| {
        tx.invoke("SET", &[key.as_str().into(), 5.into()])?;
        tx.invoke("INCRBY", &[key.as_str().into(), 2.into()])?;
        Ok(())
    })?;
    assert_eq!(replies, Value::Array(vec![Value::from("OK"), Value::Int(7)]));

    assert_eq!(conn.del(&[key.as_str()])?, 1);
    assert!(!conn.exists(&key)?);
    Ok(())
}

#[test]
fn live_server_errors_are_redis_errors() -> Result<(), RedisFacadeError> {
    let Some(mut conn) = live_connection() else {
        return Ok(());
    };
    assert!(matches!(
        conn.invoke("NOSUCHCOMMAND", &[]),
        Err(RedisFacadeError::RedisError(_))
    ));
    Ok(())
}
