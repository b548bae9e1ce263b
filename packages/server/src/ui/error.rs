//! Server-level errors.

use std::{io, net::SocketAddr};

use thiserror::Error;

use crate::config::ConfigError;

/// Errors that stop (or prevent) serving
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The listening socket could not be opened; the server never serves
    #[error("could not open server socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The listening socket became unusable; the accept loop ended
    #[error("listener failed: {0}")]
    ListenerFailure(#[source] io::Error),

    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A failed `accept()` call, classified by whether the listener survives it
#[derive(Debug, Error)]
pub enum AcceptError {
    /// Only this one connection attempt is lost; accept again right away
    #[error("transient accept failure: {0}")]
    Transient(#[source] io::Error),

    /// Out of file descriptors, buffers or memory (EMFILE, ENFILE, ENOBUFS,
    /// ENOMEM) or an unrecognised error; accept again after a pause
    #[error("accept failed, backing off: {0}")]
    Throttled(#[source] io::Error),

    /// The listening socket itself is unusable (EBADF, EINVAL, ENOTSOCK, ...)
    #[error("listener unusable: {0}")]
    ListenerFailure(#[source] io::Error),
}

impl AcceptError {
    pub fn classify(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut => AcceptError::Transient(error),
            io::ErrorKind::InvalidInput | io::ErrorKind::Unsupported => {
                AcceptError::ListenerFailure(error)
            }
            _ if is_broken_listener(&error) => AcceptError::ListenerFailure(error),
            _ => AcceptError::Throttled(error),
        }
    }
}

#[cfg(unix)]
fn is_broken_listener(error: &io::Error) -> bool {
    matches!(
        error.raw_os_error(),
        Some(libc::EBADF | libc::ENOTSOCK | libc::EOPNOTSUPP)
    )
}

#[cfg(not(unix))]
fn is_broken_listener(_error: &io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_transient_errors() {
        // テスト項目: 接続単位のエラーは一時的なものとして分類される
        // given (前提条件):
        let kinds = [
            io::ErrorKind::ConnectionAborted,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::Interrupted,
            io::ErrorKind::TimedOut,
        ];

        for kind in kinds {
            // when (操作):
            let classified = AcceptError::classify(io::Error::from(kind));

            // then (期待する結果):
            assert!(matches!(classified, AcceptError::Transient(_)), "{kind:?}");
        }
    }

    #[test]
    fn test_classify_listener_failure() {
        // テスト項目: リスナー自体が使えないエラーはリスナー障害として分類される
        // given (前提条件):
        let error = io::Error::from(io::ErrorKind::InvalidInput);

        // when (操作):
        let classified = AcceptError::classify(error);

        // then (期待する結果):
        assert!(matches!(classified, AcceptError::ListenerFailure(_)));
    }

    #[test]
    fn test_classify_unknown_error_backs_off() {
        // テスト項目: 原因不明のエラーではサーバーを止めず、待機後に再試行する
        // given (前提条件):
        let error = io::Error::other("something odd");

        // when (操作):
        let classified = AcceptError::classify(error);

        // then (期待する結果):
        assert!(matches!(classified, AcceptError::Throttled(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_resource_exhaustion_backs_off() {
        // テスト項目: ファイルディスクリプタやメモリの枯渇はリスナー障害ではなく一時的な待機扱いになる
        // given (前提条件):
        let codes = [libc::EMFILE, libc::ENFILE, libc::ENOBUFS, libc::ENOMEM];

        for code in codes {
            // when (操作):
            let classified = AcceptError::classify(io::Error::from_raw_os_error(code));

            // then (期待する結果):
            assert!(matches!(classified, AcceptError::Throttled(_)), "errno {code}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_classify_broken_socket_errors() {
        // テスト項目: 不正なソケットを示す errno はリスナー障害になる
        // given (前提条件):
        let codes = [libc::EBADF, libc::ENOTSOCK, libc::EINVAL];

        for code in codes {
            // when (操作):
            let classified = AcceptError::classify(io::Error::from_raw_os_error(code));

            // then (期待する結果):
            assert!(
                matches!(classified, AcceptError::ListenerFailure(_)),
                "errno {code}"
            );
        }
    }
}
