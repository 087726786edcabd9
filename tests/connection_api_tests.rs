//! Tests for the connection API against an in-memory CAS engine
//!
//! These tests cover the broker handshake, transaction control, liveness
//! checks, deadlines and the closed-session behavior of `Connection`.

mod common;

use std::time::Duration;

use common::{connect, connect_with, test_config, MockEngine, CAS_PID, SESSION_CAS_INFO};
use cubrid_rs::constants::{handshake, tran_type, CubridType, FunctionCode};
use cubrid_rs::{lookup, register, ColumnInfoLayout, Config, Error};

mod handshake_tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_opens_database() {
        let engine = MockEngine::new();
        let conn = connect(&engine).await;

        assert!(!conn.is_closed());
        assert_eq!(conn.server_info().cas_pid, CAS_PID);
        assert_eq!(conn.protocol_version(), handshake::PROTOCOL_VERSION);
        assert_eq!(conn.column_layout(), ColumnInfoLayout::V10);
        assert_eq!(conn.session_handle().await, CAS_PID);

        let (db, user, password, ext) = engine.open_request().unwrap();
        assert_eq!(db, "demodb");
        assert_eq!(user, "dba");
        assert_eq!(password, "secret");
        assert_eq!(ext, "");
        assert!(engine.requests().is_empty());
    }

    #[tokio::test]
    async fn test_connect_forwards_url_properties() {
        let engine = MockEngine::new();
        let config: Config = "cci:CUBRID:localhost:33000:demodb:dba:secret:?charset=utf-8"
            .parse()
            .unwrap();
        connect_with(&engine, config).await.unwrap();

        let (_, _, _, ext) = engine.open_request().unwrap();
        assert_eq!(ext, "charset=utf-8");
    }

    #[tokio::test]
    async fn test_connect_follows_broker_redirect() {
        let engine = MockEngine::new();
        engine.redirect_to(33107);

        let conn = connect(&engine).await;
        assert_eq!(engine.reconnected_to(), Some(33107));
        assert!(!conn.is_closed());
    }

    #[tokio::test]
    async fn test_connect_refused_by_broker() {
        let engine = MockEngine::new();
        engine.refuse_with(-10);

        let err = connect_with(&engine, test_config()).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionRefused { code: -10 }));
        assert!(engine.is_closed());
        assert!(engine.open_request().is_none());
    }

    #[tokio::test]
    async fn test_connect_login_failure_returns_error() {
        let engine = MockEngine::new();
        engine.fail_login(-165, "User dba is invalid.");

        let err = connect_with(&engine, test_config()).await.unwrap_err();
        assert_eq!(err.engine_code(), Some(-165));
        assert!(err.to_string().contains("User dba is invalid."));
        assert!(engine.is_closed());
    }

    #[tokio::test]
    async fn test_overlong_credentials_rejected_before_sending() {
        let engine = MockEngine::new();
        let config = Config::new("localhost", 33000, "demodb", "dba", "p".repeat(40));

        let err = connect_with(&engine, config).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConnectionString(_)));
        assert!(engine.open_request().is_none());
        assert!(engine.is_closed());

        let engine = MockEngine::new();
        let config = Config::new("localhost", 33000, "demodb", "u".repeat(31), "secret");
        connect_with(&engine, config).await.unwrap();
        let (_, user, _, _) = engine.open_request().unwrap();
        assert_eq!(user, "u".repeat(31));
    }

    #[tokio::test]
    async fn test_old_protocol_uses_v9_column_layout() {
        let engine = MockEngine::new();
        engine.set_protocol_version(5);
        engine.register_query(
            "SELECT code, name FROM athlete",
            &[("code", CubridType::Int), ("name", CubridType::String)],
            0,
            Vec::new(),
        );

        let conn = connect(&engine).await;
        assert_eq!(conn.protocol_version(), 5);
        assert_eq!(conn.column_layout(), ColumnInfoLayout::V9x);

        let stmt = conn.prepare("SELECT code, name FROM athlete").await.unwrap();
        assert_eq!(stmt.column_count(), 2);
        assert_eq!(stmt.columns()[0].cubrid_type, CubridType::Int);
        assert_eq!(stmt.columns()[1].name, "name");
        assert_eq!(stmt.columns()[1].table.as_deref(), Some("mock_table"));
    }

    #[tokio::test]
    async fn test_requests_echo_last_cas_info() {
        let engine = MockEngine::new();
        let conn = connect(&engine).await;

        conn.ping().await.unwrap();
        conn.ping().await.unwrap();

        let seen = engine.cas_info_seen();
        assert_eq!(seen[0], [0, 0xff, 0xff, 0xff]);
        assert_eq!(seen[1], SESSION_CAS_INFO);
    }
}

mod transaction_tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_and_rollback() {
        let engine = MockEngine::new();
        let conn = connect(&engine).await;

        conn.commit().await.unwrap();
        conn.rollback().await.unwrap();

        assert_eq!(engine.end_trans(), vec![tran_type::COMMIT, tran_type::ROLLBACK]);
    }

    #[tokio::test]
    async fn test_begin_records_start_until_commit() {
        let engine = MockEngine::new();
        let conn = connect(&engine).await;
        assert!(conn.transaction_start().await.is_none());

        let tx = conn.begin().await.unwrap();
        assert!(conn.transaction_start().await.is_some());
        assert_eq!(engine.count(FunctionCode::EndTran), 0);

        tx.commit().await.unwrap();
        assert!(conn.transaction_start().await.is_none());
        assert_eq!(engine.end_trans(), vec![tran_type::COMMIT]);
    }

    #[tokio::test]
    async fn test_transaction_rollback() {
        let engine = MockEngine::new();
        let conn = connect(&engine).await;

        let tx = conn.begin().await.unwrap();
        assert!(!tx.connection().is_closed());
        tx.rollback().await.unwrap();
        assert_eq!(engine.end_trans(), vec![tran_type::ROLLBACK]);
    }

    #[tokio::test]
    async fn test_in_transaction_follows_server_status() {
        let engine = MockEngine::new();
        engine.register_dml("UPDATE t SET a = 1", 0, 3);
        let conn = connect(&engine).await;
        assert!(!conn.in_transaction().await);

        let mut stmt = conn.prepare("UPDATE t SET a = 1").await.unwrap();
        assert!(!conn.in_transaction().await);
        stmt.exec(&[]).await.unwrap();
        assert!(conn.in_transaction().await);

        conn.commit().await.unwrap();
        assert!(!conn.in_transaction().await);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_transaction() {
        let engine = MockEngine::new();
        engine.fail_function(FunctionCode::EndTran, -72, "Transaction aborted");
        let conn = connect(&engine).await;

        conn.begin().await.unwrap();
        let err = conn.commit().await.unwrap_err();
        assert_eq!(err.engine_code(), Some(-72));
        assert!(conn.transaction_start().await.is_some());
        assert!(!conn.is_closed());
    }
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_ping() {
        let engine = MockEngine::new();
        let conn = connect(&engine).await;

        conn.ping().await.unwrap();
        assert_eq!(engine.count(FunctionCode::CheckCas), 1);
    }

    #[tokio::test]
    async fn test_close_twice_is_bad_connection() {
        let engine = MockEngine::new();
        let conn = connect(&engine).await;

        conn.close().await.unwrap();
        assert!(conn.is_closed());
        assert!(engine.is_closed());
        assert_eq!(conn.session_handle().await, -1);

        let err = conn.close().await.unwrap_err();
        assert!(matches!(err, Error::BadConnection));
        assert_eq!(engine.count(FunctionCode::ConClose), 1);
    }

    #[tokio::test]
    async fn test_rejected_close_keeps_session() {
        let engine = MockEngine::new();
        engine.fail_function(FunctionCode::ConClose, -1, "cannot close");
        let conn = connect(&engine).await;

        let err = conn.close().await.unwrap_err();
        assert!(matches!(err, Error::Engine { .. }));
        assert!(!conn.is_closed());

        engine.clear_failure(FunctionCode::ConClose);
        conn.ping().await.unwrap();
        conn.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_operations_after_close_send_nothing() {
        let engine = MockEngine::new();
        let conn = connect(&engine).await;
        conn.close().await.unwrap();
        let sent = engine.requests().len();

        assert!(matches!(conn.prepare("SELECT 1").await, Err(Error::BadConnection)));
        assert!(matches!(conn.commit().await, Err(Error::BadConnection)));
        assert!(matches!(conn.ping().await, Err(Error::BadConnection)));
        assert!(matches!(conn.begin().await, Err(Error::BadConnection)));
        assert_eq!(engine.requests().len(), sent);
    }

    #[tokio::test]
    async fn test_clones_share_session() {
        let engine = MockEngine::new();
        let conn = connect(&engine).await;
        let other = conn.clone();

        other.close().await.unwrap();
        assert!(conn.is_closed());
        assert_eq!(conn.id(), other.id());
    }

    #[tokio::test]
    async fn test_query_timeout_closes_session() {
        let engine = MockEngine::new();
        engine.stall_on(FunctionCode::CheckCas);
        let config = test_config().query_timeout(Duration::from_millis(50));
        let conn = connect_with(&engine, config).await.unwrap();

        let err = conn.ping().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(d) if d == Duration::from_millis(50)));
        assert!(conn.is_closed());
        assert!(engine.is_closed());
        assert!(matches!(conn.ping().await, Err(Error::BadConnection)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reply_after_deadline_is_never_read() {
        let engine = MockEngine::new();
        engine.register_dml("DELETE FROM t", 0, 1);
        engine.delay_reply_on(FunctionCode::CheckCas, Duration::from_millis(300));
        let config = test_config().query_timeout(Duration::from_millis(50));
        let conn = connect_with(&engine, config).await.unwrap();

        let err = conn.ping().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(conn.is_closed());
        assert!(engine.is_closed());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(matches!(conn.prepare("DELETE FROM t").await, Err(Error::BadConnection)));
        assert_eq!(engine.count(FunctionCode::Prepare), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_request_closes_session() {
        let engine = MockEngine::new();
        engine.register_dml("DELETE FROM t", 0, 1);
        engine.delay_reply_on(FunctionCode::CheckCas, Duration::from_millis(300));
        let conn = connect(&engine).await;

        let abandoned = tokio::time::timeout(Duration::from_millis(50), conn.ping()).await;
        assert!(abandoned.is_err());
        assert!(conn.is_closed());
        assert_eq!(conn.session_handle().await, -1);
        assert!(!conn.in_transaction().await);

        let err = conn.prepare("DELETE FROM t").await.unwrap_err();
        assert!(matches!(err, Error::BadConnection));
        assert_eq!(engine.count(FunctionCode::Prepare), 0);
        assert!(engine.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_reply_within_deadline() {
        let engine = MockEngine::new();
        engine.delay_reply_on(FunctionCode::CheckCas, Duration::from_millis(20));
        let config = test_config().query_timeout(Duration::from_millis(50));
        let conn = connect_with(&engine, config).await.unwrap();

        conn.ping().await.unwrap();
        conn.ping().await.unwrap();
        assert!(!conn.is_closed());
    }

    #[tokio::test]
    async fn test_disconnected_transport_closes_session() {
        let engine = MockEngine::new();
        let conn = connect(&engine).await;
        engine.sever();

        let err = conn.ping().await.unwrap_err();
        assert!(matches!(err, Error::BadConnection));
        assert!(conn.is_closed());
        assert!(engine.is_closed());
        assert!(engine.requests().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_socket_closes_session() {
        let engine = MockEngine::new();
        engine.drop_connection_on(FunctionCode::CheckCas);
        let conn = connect(&engine).await;

        let err = conn.ping().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert!(conn.is_closed());
        assert!(matches!(conn.commit().await, Err(Error::BadConnection)));
    }
}

mod driver_tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let driver = register();
        assert_eq!(driver.name(), "cubrid");
        assert!(lookup("cubrid").is_some());
        assert!(lookup("mysql").is_none());
    }

    #[test]
    fn test_open_connector_parses_url() {
        let connector = register()
            .open_connector("cci:CUBRID:db.example.com:30000:demodb:dba::?fetch_size=10")
            .unwrap();
        assert_eq!(connector.config().host, "db.example.com");
        assert_eq!(connector.config().port, 30000);
        assert_eq!(connector.config().fetch_size, 10);
    }

    #[test]
    fn test_open_connector_rejects_bad_url() {
        let err = register().open_connector("mysql://localhost/db").unwrap_err();
        assert!(matches!(err, Error::InvalidConnectionString(_)));
    }
}
