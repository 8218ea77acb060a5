//! Fixed diagnostic statements for each supported engine.

use crate::targets::DriverKind;

/// The statements every monitoring operation runs for one engine.
#[derive(Debug)]
pub struct Dialect {
    /// Must return exactly one row holding the value `1`.
    pub liveness: &'static str,
    /// One row, first column: the server version banner.
    pub version: &'static str,
    /// One row: instance name, instance status, database status.
    pub instance: &'static str,
    /// One row holding the instance startup time. `None` when the engine
    /// has no such notion.
    pub startup_time: Option<&'static str>,
    /// Usage per tablespace, ordered by tablespace name.
    pub tablespace: &'static str,
    /// User sessions, ordered by status then idle seconds descending.
    /// `None` when the engine has no session view.
    pub sessions: Option<&'static str>,
}

pub const ORACLE: Dialect = Dialect {
    liveness: "SELECT 1 FROM DUAL",
    version: "SELECT BANNER FROM V$VERSION WHERE ROWNUM = 1",
    instance: "SELECT INSTANCE_NAME, STATUS, DATABASE_STATUS FROM V$INSTANCE",
    startup_time: Some("SELECT STARTUP_TIME FROM V$INSTANCE"),
    tablespace: r#"
        SELECT
            df.tablespace_name "Tablespace",
            df.bytes / (1024 * 1024) "Size (MB)",
            SUM(fs.bytes) / (1024 * 1024) "Free (MB)",
            df.bytes / (1024 * 1024) - SUM(fs.bytes) / (1024 * 1024) "Used (MB)",
            ROUND((df.bytes - SUM(fs.bytes)) / df.bytes * 100, 2) "Used %"
        FROM
            dba_free_space fs,
            (SELECT tablespace_name, SUM(bytes) bytes FROM dba_data_files GROUP BY tablespace_name) df
        WHERE
            fs.tablespace_name (+) = df.tablespace_name
        GROUP BY
            df.tablespace_name, df.bytes
        ORDER BY
            df.tablespace_name
    "#,
    sessions: Some(
        r#"
        SELECT
            s.sid,
            s.serial#,
            s.username,
            s.status,
            s.machine,
            s.program,
            s.logon_time,
            s.last_call_et "Seconds Since Last Call"
        FROM
            v$session s
        WHERE
            s.type = 'USER'
        ORDER BY
            s.status, s.last_call_et DESC
    "#,
    ),
};

/// SQLite reports its single `main` database as the only tablespace.
pub const SQLITE: Dialect = Dialect {
    liveness: "SELECT 1",
    version: "SELECT 'SQLite ' || sqlite_version() AS BANNER",
    instance: "SELECT name AS INSTANCE_NAME, 'OPEN' AS STATUS, 'ACTIVE' AS DATABASE_STATUS \
               FROM pragma_database_list WHERE name = 'main'",
    startup_time: None,
    tablespace: r#"
        SELECT
            'main' AS "Tablespace",
            ROUND(pc.page_count * ps.page_size / 1048576.0, 2) AS "Size (MB)",
            ROUND(fl.freelist_count * ps.page_size / 1048576.0, 2) AS "Free (MB)",
            ROUND((pc.page_count - fl.freelist_count) * ps.page_size / 1048576.0, 2) AS "Used (MB)",
            ROUND(100.0 * (pc.page_count - fl.freelist_count) / pc.page_count, 2) AS "Used %"
        FROM
            pragma_page_count() pc,
            pragma_page_size() ps,
            pragma_freelist_count() fl
        ORDER BY
            1
    "#,
    sessions: None,
};

impl Dialect {
    pub fn for_driver(driver: DriverKind) -> &'static Dialect {
        match driver {
            DriverKind::Oracle => &ORACLE,
            DriverKind::Sqlite => &SQLITE,
        }
    }
}
