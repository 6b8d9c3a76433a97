//! Fixed catalog query texts.
//!
//! Every query returns one flat record set whose column names match the
//! record types in [`crate::catalog`]. Numeric columns are cast to `INT` and
//! flags to `BIT` so that each field decodes to a single Rust type.

/// Stored procedures and table-valued functions, excluding system-shipped
/// procedures and database-tools support objects.
pub const ROUTINES_SQL: &str = r"
SELECT  R.SPECIFIC_SCHEMA,
        R.SPECIFIC_NAME,
        R.ROUTINE_TYPE
FROM    INFORMATION_SCHEMA.ROUTINES R
WHERE   R.ROUTINE_TYPE = 'PROCEDURE'
        AND EXISTS (
            SELECT  1
            FROM    sys.all_objects AS sp
            WHERE   sp.type = 'P'
                    AND SCHEMA_NAME(sp.schema_id) = R.SPECIFIC_SCHEMA
                    AND sp.name = R.SPECIFIC_NAME
                    AND sp.is_ms_shipped = 0
                    AND NOT EXISTS (
                        SELECT  1
                        FROM    sys.extended_properties ep
                        WHERE   ep.major_id = sp.object_id
                                AND ep.minor_id = 0
                                AND ep.class = 1
                                AND ep.name = N'microsoft_database_tools_support'))
UNION ALL
SELECT  R.SPECIFIC_SCHEMA,
        R.SPECIFIC_NAME,
        R.ROUTINE_TYPE
FROM    INFORMATION_SCHEMA.ROUTINES R
WHERE   R.ROUTINE_TYPE = 'FUNCTION'
        AND R.DATA_TYPE = 'TABLE'
";

/// Parameters of every routine, in declared order. Return values are excluded.
pub const PARAMETERS_SQL: &str = r"
SELECT  P.SPECIFIC_SCHEMA,
        P.SPECIFIC_NAME,
        CAST(P.ORDINAL_POSITION AS INT) AS ORDINAL_POSITION,
        P.PARAMETER_MODE,
        P.PARAMETER_NAME,
        P.DATA_TYPE,
        CAST(P.CHARACTER_MAXIMUM_LENGTH AS INT) AS CHARACTER_MAXIMUM_LENGTH,
        CAST(P.NUMERIC_PRECISION AS INT) AS NUMERIC_PRECISION,
        CAST(P.NUMERIC_SCALE AS INT) AS NUMERIC_SCALE,
        P.USER_DEFINED_TYPE_SCHEMA,
        P.USER_DEFINED_TYPE_NAME
FROM    INFORMATION_SCHEMA.PARAMETERS P
WHERE   P.IS_RESULT = 'NO' OR P.IS_RESULT IS NULL
ORDER BY P.SPECIFIC_SCHEMA, P.SPECIFIC_NAME, P.ORDINAL_POSITION
";

/// Columns of every user table.
pub const TABLE_COLUMNS_SQL: &str = r"
SELECT  C.TABLE_SCHEMA,
        C.TABLE_NAME,
        C.COLUMN_NAME,
        CAST(C.ORDINAL_POSITION AS INT) AS ORDINAL_POSITION,
        C.DATA_TYPE,
        CAST(C.CHARACTER_MAXIMUM_LENGTH AS INT) AS CHARACTER_MAXIMUM_LENGTH,
        CAST(C.NUMERIC_PRECISION AS INT) AS NUMERIC_PRECISION,
        CAST(C.NUMERIC_SCALE AS INT) AS NUMERIC_SCALE,
        C.IS_NULLABLE,
        CAST(ISNULL(COLUMNPROPERTY(OBJECT_ID(QUOTENAME(C.TABLE_SCHEMA) + '.' + QUOTENAME(C.TABLE_NAME)), C.COLUMN_NAME, 'IsIdentity'), 0) AS BIT) AS IS_IDENTITY,
        CAST(ISNULL(COLUMNPROPERTY(OBJECT_ID(QUOTENAME(C.TABLE_SCHEMA) + '.' + QUOTENAME(C.TABLE_NAME)), C.COLUMN_NAME, 'IsRowGuidCol'), 0) AS BIT) AS IS_ROWGUID_COL,
        CAST(ISNULL(COLUMNPROPERTY(OBJECT_ID(QUOTENAME(C.TABLE_SCHEMA) + '.' + QUOTENAME(C.TABLE_NAME)), C.COLUMN_NAME, 'IsComputed'), 0) AS BIT) AS IS_COMPUTED,
        C.COLUMN_DEFAULT
FROM    INFORMATION_SCHEMA.COLUMNS C
        INNER JOIN INFORMATION_SCHEMA.TABLES T
            ON T.TABLE_SCHEMA = C.TABLE_SCHEMA AND T.TABLE_NAME = C.TABLE_NAME
WHERE   T.TABLE_TYPE = 'BASE TABLE'
        AND T.TABLE_NAME <> 'sysdiagrams'
ORDER BY C.TABLE_SCHEMA, C.TABLE_NAME, C.ORDINAL_POSITION
";

/// Columns of every user-defined table type, shaped like [`TABLE_COLUMNS_SQL`].
pub const TABLE_TYPE_COLUMNS_SQL: &str = r"
SELECT  SCHEMA_NAME(TT.schema_id) AS TABLE_SCHEMA,
        TT.name AS TABLE_NAME,
        C.name AS COLUMN_NAME,
        CAST(C.column_id AS INT) AS ORDINAL_POSITION,
        TYPE_NAME(C.system_type_id) AS DATA_TYPE,
        CAST(CASE
            WHEN C.max_length = -1 THEN -1
            WHEN TYPE_NAME(C.system_type_id) IN ('nchar', 'nvarchar') THEN C.max_length / 2
            WHEN TYPE_NAME(C.system_type_id) IN ('char', 'varchar', 'binary', 'varbinary') THEN C.max_length
        END AS INT) AS CHARACTER_MAXIMUM_LENGTH,
        CAST(CASE WHEN C.precision > 0 THEN C.precision END AS INT) AS NUMERIC_PRECISION,
        CAST(CASE WHEN C.precision > 0 THEN C.scale END AS INT) AS NUMERIC_SCALE,
        CASE WHEN C.is_nullable = 1 THEN 'YES' ELSE 'NO' END AS IS_NULLABLE,
        C.is_identity AS IS_IDENTITY,
        C.is_rowguidcol AS IS_ROWGUID_COL,
        C.is_computed AS IS_COMPUTED,
        OBJECT_DEFINITION(C.default_object_id) AS COLUMN_DEFAULT
FROM    sys.table_types TT
        INNER JOIN sys.columns C ON C.object_id = TT.type_table_object_id
WHERE   TT.is_user_defined = 1
ORDER BY TABLE_SCHEMA, TABLE_NAME, ORDINAL_POSITION
";

/// One row per (constraint, column). Foreign keys carry the referenced
/// primary-key column; other constraint kinds leave the `PK_` fields NULL.
pub const COLUMN_CONSTRAINTS_SQL: &str = r"
SELECT  KCU.TABLE_SCHEMA,
        KCU.TABLE_NAME,
        KCU.COLUMN_NAME,
        TC.CONSTRAINT_NAME,
        TC.CONSTRAINT_TYPE,
        PK.TABLE_SCHEMA AS PK_TABLE_SCHEMA,
        PK.TABLE_NAME AS PK_TABLE_NAME,
        PK.COLUMN_NAME AS PK_COLUMN_NAME
FROM    INFORMATION_SCHEMA.TABLE_CONSTRAINTS TC
        INNER JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE KCU
            ON KCU.CONSTRAINT_SCHEMA = TC.CONSTRAINT_SCHEMA
            AND KCU.CONSTRAINT_NAME = TC.CONSTRAINT_NAME
        LEFT JOIN INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS RC
            ON RC.CONSTRAINT_SCHEMA = TC.CONSTRAINT_SCHEMA
            AND RC.CONSTRAINT_NAME = TC.CONSTRAINT_NAME
        LEFT JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE PK
            ON PK.CONSTRAINT_SCHEMA = RC.UNIQUE_CONSTRAINT_SCHEMA
            AND PK.CONSTRAINT_NAME = RC.UNIQUE_CONSTRAINT_NAME
            AND PK.ORDINAL_POSITION = KCU.ORDINAL_POSITION
ORDER BY KCU.TABLE_SCHEMA, KCU.TABLE_NAME, TC.CONSTRAINT_NAME, KCU.ORDINAL_POSITION
";

/// Quotes an identifier for use inside `[...]`.
fn bracket(identifier: &str) -> String {
    format!("[{}]", identifier.replace(']', "]]"))
}

/// Builds the metadata-only query describing the first result set of a
/// stored procedure.
///
/// The procedure call is embedded as a string literal, so both bracket and
/// quote characters in the identifiers are escaped.
///
/// # Example
/// ```rust
/// use dbreverse_core::catalog::queries::describe_first_result_set_sql;
///
/// let sql = describe_first_result_set_sql("dbo", "GetOrder");
/// assert!(sql.contains("'EXEC [dbo].[GetOrder]'"));
/// ```
pub fn describe_first_result_set_sql(schema: &str, name: &str) -> String {
    let call = format!("EXEC {}.{}", bracket(schema), bracket(name));
    format!(
        "SELECT CAST(column_ordinal AS INT) AS column_ordinal, name, TYPE_NAME(system_type_id) AS type_name, \
         source_table, source_column, is_nullable, is_hidden \
         FROM sys.dm_exec_describe_first_result_set('{}', NULL, 1)",
        call.replace('\'', "''")
    )
}
