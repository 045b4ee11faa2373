//! The loader's entire SQL surface. Statements are plain strings because the
//! warehouse runs them verbatim; nothing here is parameterized by user input
//! beyond validated configuration.

/// Malformed JSON rows tolerated per COPY before the load is rejected.
pub const MAX_LOAD_ERRORS: u32 = 10;

pub const CREATE_SCHEMA: &str = "create schema if not exists raw";

/// Staging shape only; nested fields like `cores` stay in the raw JSON and
/// are dealt with by the dbt models.
pub const CREATE_TABLE: &str = "\
create table if not exists raw.spacex_launches (
    id         varchar(64),
    name       varchar(256),
    date_utc   varchar(64),
    date_unix  bigint,
    launchpad  varchar(64),
    success    boolean
)";

pub const TRUNCATE: &str = "truncate table raw.spacex_launches";

/// Bulk load every object at `path`, mapping JSON keys to column names.
pub fn copy_from(path: &str, region: &str, iam_role_arn: &str) -> String {
    format!(
        "copy raw.spacex_launches\n\
         from '{path}'\n\
         region '{region}'\n\
         format as json 'auto'\n\
         timeformat 'auto'\n\
         truncatecolumns\n\
         compupdate off\n\
         statupdate on\n\
         maxerror {MAX_LOAD_ERRORS}\n\
         iam_role '{iam_role_arn}'"
    )
}
