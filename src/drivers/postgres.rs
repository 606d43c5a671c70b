use super::{BoxError, Connection, Driver, Timeouts, native_url, with_scheme, with_timeout};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{
    Column, ConnectOptions, Connection as _, Row, TypeInfo, ValueRef,
    postgres::{PgConnectOptions, PgConnection, PgRow},
};
use std::{str::FromStr, time::Duration};

#[derive(Debug, Clone, Copy)]
pub struct PgDriver {
    timeouts: Timeouts,
}

impl PgDriver {
    #[must_use]
    pub const fn new(timeouts: Timeouts) -> Self {
        Self { timeouts }
    }
}

/// Build connect options from a JDBC or native URL
///
/// # Errors
///
/// Returns an error if the URL can't be parsed
pub fn connect_options(
    url: &str,
    user: Option<&str>,
    password: Option<&str>,
) -> Result<PgConnectOptions, sqlx::Error> {
    let mut options = PgConnectOptions::from_str(&with_scheme(native_url(url), "postgres"))?;

    if let Some(user) = user.filter(|user| !user.is_empty()) {
        options = options.username(user);
    }

    if let Some(password) = password {
        options = options.password(password);
    }

    Ok(options)
}

#[async_trait]
impl Driver for PgDriver {
    async fn open(
        &self,
        url: &str,
        user: Option<&str>,
        password: Option<&str>,
    ) -> Result<Box<dyn Connection>, BoxError> {
        let options = connect_options(url, user, password)?;
        let conn = with_timeout(self.timeouts.connect, "connection attempt", options.connect())
            .await?;

        Ok(Box::new(PgSession {
            conn,
            query_timeout: self.timeouts.query,
        }))
    }
}

struct PgSession {
    conn: PgConnection,
    query_timeout: Duration,
}

#[async_trait]
impl Connection for PgSession {
    async fn fetch_first_value(&mut self, query: &str) -> Result<Option<String>, BoxError> {
        let row = with_timeout(
            self.query_timeout,
            "probe query",
            sqlx::query(query).fetch_optional(&mut self.conn),
        )
        .await?;

        match row {
            Some(row) => Ok(first_value(&row)?),
            None => Ok(None),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), BoxError> {
        let session = *self;
        session.conn.close().await.map_err(Into::into)
    }
}

fn first_value(row: &PgRow) -> Result<Option<String>, sqlx::Error> {
    let Some(column) = row.columns().first() else {
        return Ok(None);
    };

    if row.try_get_raw(0)?.is_null() {
        return Ok(None);
    }

    let value = row
        .try_get::<String, _>(0)
        .or_else(|_| row.try_get::<i64, _>(0).map(|v| v.to_string()))
        .or_else(|_| row.try_get::<i32, _>(0).map(|v| v.to_string()))
        .or_else(|_| row.try_get::<i16, _>(0).map(|v| v.to_string()))
        .or_else(|_| row.try_get::<f64, _>(0).map(|v| v.to_string()))
        .or_else(|_| row.try_get::<bool, _>(0).map(|v| v.to_string()))
        .or_else(|_| row.try_get::<NaiveDate, _>(0).map(|v| v.to_string()))
        .or_else(|_| row.try_get::<NaiveDateTime, _>(0).map(|v| v.to_string()))
        .or_else(|_| row.try_get::<DateTime<Utc>, _>(0).map(|v| v.to_rfc3339()))
        .or_else(|_| row.try_get::<NaiveTime, _>(0).map(|v| v.to_string()))
        .unwrap_or_else(|_| format!("<{}>", column.type_info().name()));

    Ok(Some(value))
}
