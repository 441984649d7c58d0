//! 데이터 모듈 오류 타입.

use kline_exchange::ExchangeError;
use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 테이블 또는 레코드를 찾을 수 없음
    #[error("Not found: {0}")]
    NotFound(String),

    /// 중복 레코드 (고유 제약 조건 위반)
    #[error("Duplicate record: {0}")]
    DuplicateError(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 테이블 이름으로 쓸 수 없는 심볼
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    /// 연결 풀 소진
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// 데이터 삽입 오류
    #[error("Insert error: {0}")]
    InsertError(String),

    /// 삽입 후 처리되지 않은 행이 남음
    #[error("Incomplete insert: {unhandled} of {total} rows neither inserted nor present")]
    IncompleteInsert { unhandled: usize, total: usize },

    /// 원격 데이터 가져오기 오류
    #[error("Fetch error: {0}")]
    FetchError(String),
}

impl DataError {
    /// 이미 저장된 행과 충돌한 경우인지 확인.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DataError::DuplicateError(_))
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DataError::NotFound("Row not found".to_string()),
            sqlx::Error::PoolTimedOut => DataError::PoolExhausted,
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or_default();
                if code == "23505" {
                    // PostgreSQL 고유 제약 조건 위반
                    DataError::DuplicateError(db_err.message().to_string())
                } else {
                    DataError::QueryError(db_err.message().to_string())
                }
            }
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<ExchangeError> for DataError {
    fn from(err: ExchangeError) -> Self {
        DataError::FetchError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
