//! CREATE TABLE rendering from introspected metadata.
//!
//! Each dialect assembles its script from the column and index listings the
//! catalog queries return, so a table can be recreated even when the server
//! offers no native DDL dump.

use crate::db::builder::{
    MySqlBuilder, OracleBuilder, PostgresBuilder, SqlBuilder, SqlServerBuilder, quote_literal,
};
use crate::models::{ColumnInfo, IndexInfo, IndexType};

/// Primary key columns, preferring the index listing over per-column flags
/// so composite keys keep their declared order.
fn primary_key_columns(columns: &[ColumnInfo], indexes: &[IndexInfo]) -> Vec<String> {
    if let Some(pk) = indexes.iter().find(|i| i.is_primary) {
        return pk.columns.clone();
    }
    columns
        .iter()
        .filter(|c| c.is_primary_key)
        .map(|c| c.name.clone())
        .collect()
}

fn join_escaped(builder: &dyn SqlBuilder, names: &[String]) -> String {
    names
        .iter()
        .map(|n| builder.escape_identifier(n))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn mysql_create_table(
    schema: &str,
    table: &str,
    columns: &[ColumnInfo],
    indexes: &[IndexInfo],
) -> String {
    let b = MySqlBuilder;
    let mut lines = Vec::new();
    for col in columns {
        let mut line = format!(
            "  {} {}",
            b.escape_identifier(&col.name),
            b.format_data_type(col)
        );
        if !col.is_nullable {
            line.push_str(" NOT NULL");
        }
        if col.is_identity {
            line.push_str(" AUTO_INCREMENT");
        } else if let Some(default) = &col.default_value {
            let formatted = b.format_default_value(default, &col.data_type);
            if !formatted.is_empty() {
                line.push(' ');
                line.push_str(&formatted);
            }
        }
        if let Some(comment) = &col.comment {
            if !comment.is_empty() {
                line.push_str(&format!(" COMMENT '{}'", quote_literal(comment)));
            }
        }
        lines.push(line);
    }

    let pk = primary_key_columns(columns, indexes);
    if !pk.is_empty() {
        lines.push(format!("  PRIMARY KEY ({})", join_escaped(&b, &pk)));
    }
    for index in indexes.iter().filter(|i| !i.is_primary) {
        let cols = join_escaped(&b, &index.columns);
        let name = b.escape_identifier(&index.name);
        let line = if index.is_unique {
            format!("  UNIQUE KEY {} ({})", name, cols)
        } else {
            match index.index_type {
                IndexType::Fulltext => format!("  FULLTEXT KEY {} ({})", name, cols),
                IndexType::Spatial => format!("  SPATIAL KEY {} ({})", name, cols),
                _ => format!("  KEY {} ({})", name, cols),
            }
        };
        lines.push(line);
    }

    format!(
        "CREATE TABLE {} (\n{}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;",
        b.qualified_name(schema, table),
        lines.join(",\n")
    )
}

pub(crate) fn postgres_create_table(
    schema: &str,
    table: &str,
    columns: &[ColumnInfo],
    indexes: &[IndexInfo],
) -> String {
    let b = PostgresBuilder;
    let qualified = b.qualified_name(schema, table);
    let mut lines = Vec::new();
    for col in columns {
        let mut line = format!(
            "  {} {}",
            b.escape_identifier(&col.name),
            b.format_data_type(col)
        );
        if col.is_identity {
            line.push_str(" GENERATED BY DEFAULT AS IDENTITY");
        } else if let Some(default) = &col.default_value {
            let formatted = b.format_default_value(default, &col.data_type);
            if !formatted.is_empty() {
                line.push(' ');
                line.push_str(&formatted);
            }
        }
        if !col.is_nullable {
            line.push_str(" NOT NULL");
        }
        lines.push(line);
    }

    let pk = primary_key_columns(columns, indexes);
    if !pk.is_empty() {
        lines.push(format!("  PRIMARY KEY ({})", join_escaped(&b, &pk)));
    }

    let mut out = format!("CREATE TABLE {} (\n{}\n);", qualified, lines.join(",\n"));
    for index in indexes.iter().filter(|i| !i.is_primary) {
        out.push_str(&format!(
            "\nCREATE {}INDEX {} ON {} ({});",
            if index.is_unique { "UNIQUE " } else { "" },
            b.escape_identifier(&index.name),
            qualified,
            join_escaped(&b, &index.columns)
        ));
    }
    for col in columns {
        if let Some(comment) = &col.comment {
            if !comment.is_empty() {
                out.push_str(&format!(
                    "\nCOMMENT ON COLUMN {}.{} IS '{}';",
                    qualified,
                    b.escape_identifier(&col.name),
                    quote_literal(comment)
                ));
            }
        }
    }
    out
}

pub(crate) fn mssql_create_table(
    schema: &str,
    table: &str,
    columns: &[ColumnInfo],
    indexes: &[IndexInfo],
) -> String {
    let b = SqlServerBuilder;
    let qualified = b.qualified_name(schema, table);
    let mut lines = Vec::new();
    for col in columns {
        let mut line = format!(
            "  {} {}",
            b.escape_identifier(&col.name),
            b.format_data_type(col)
        );
        if col.is_identity {
            line.push_str(&format!(
                " IDENTITY({},{})",
                col.identity_seed.unwrap_or(1),
                col.identity_increment.unwrap_or(1)
            ));
        }
        line.push_str(if col.is_nullable { " NULL" } else { " NOT NULL" });
        if !col.is_identity {
            if let Some(default) = &col.default_value {
                let formatted = b.format_default_value(default, &col.data_type);
                if !formatted.is_empty() {
                    line.push(' ');
                    line.push_str(&formatted);
                }
            }
        }
        lines.push(line);
    }

    let pk = primary_key_columns(columns, indexes);
    if !pk.is_empty() {
        let clustered = indexes
            .iter()
            .find(|i| i.is_primary)
            .and_then(|i| i.is_clustered)
            .unwrap_or(true);
        lines.push(format!(
            "  CONSTRAINT {} PRIMARY KEY {} ({})",
            b.escape_identifier(&format!("PK_{}", table)),
            if clustered { "CLUSTERED" } else { "NONCLUSTERED" },
            join_escaped(&b, &pk)
        ));
    }

    let mut batches = vec![format!(
        "CREATE TABLE {} (\n{}\n);",
        qualified,
        lines.join(",\n")
    )];
    for index in indexes.iter().filter(|i| !i.is_primary) {
        let placement = match index.is_clustered {
            Some(true) => "CLUSTERED ",
            Some(false) => "NONCLUSTERED ",
            None => "",
        };
        batches.push(format!(
            "CREATE {}{}INDEX {} ON {} ({});",
            if index.is_unique { "UNIQUE " } else { "" },
            placement,
            b.escape_identifier(&index.name),
            qualified,
            join_escaped(&b, &index.columns)
        ));
    }
    for col in columns {
        if let Some(comment) = &col.comment {
            if !comment.is_empty() {
                batches.push(format!(
                    "EXEC sp_addextendedproperty @name = N'MS_Description', @value = N'{}', \
                     @level0type = N'SCHEMA', @level0name = N'{}', \
                     @level1type = N'TABLE', @level1name = N'{}', \
                     @level2type = N'COLUMN', @level2name = N'{}';",
                    quote_literal(comment),
                    quote_literal(schema),
                    quote_literal(table),
                    quote_literal(&col.name)
                ));
            }
        }
    }
    format!("{}\nGO", batches.join("\nGO\n"))
}

pub(crate) fn oracle_create_table(
    schema: &str,
    table: &str,
    columns: &[ColumnInfo],
    indexes: &[IndexInfo],
) -> String {
    let b = OracleBuilder;
    let qualified = b.qualified_name(schema, table);
    let mut lines = Vec::new();
    for col in columns {
        let mut line = format!(
            "  {} {}",
            b.escape_identifier(&col.name),
            b.format_data_type(col)
        );
        if col.is_identity {
            line.push_str(" GENERATED BY DEFAULT AS IDENTITY");
            if let (Some(seed), Some(increment)) = (col.identity_seed, col.identity_increment) {
                line.push_str(&format!(" (START WITH {} INCREMENT BY {})", seed, increment));
            }
        } else if let Some(default) = &col.default_value {
            let formatted = b.format_default_value(default, &col.data_type);
            if !formatted.is_empty() {
                line.push(' ');
                line.push_str(&formatted);
            }
        }
        if !col.is_nullable {
            line.push_str(" NOT NULL");
        }
        lines.push(line);
    }

    let pk = primary_key_columns(columns, indexes);
    if !pk.is_empty() {
        lines.push(format!(
            "  CONSTRAINT {} PRIMARY KEY ({})",
            b.escape_identifier(&format!("PK_{}", table.to_uppercase())),
            join_escaped(&b, &pk)
        ));
    }
    for index in indexes.iter().filter(|i| !i.is_primary && i.is_unique) {
        lines.push(format!(
            "  CONSTRAINT {} UNIQUE ({})",
            b.escape_identifier(&index.name),
            join_escaped(&b, &index.columns)
        ));
    }

    let mut out = format!("CREATE TABLE {} (\n{}\n);", qualified, lines.join(",\n"));
    for index in indexes.iter().filter(|i| !i.is_primary && !i.is_unique) {
        out.push_str(&format!(
            "\nCREATE {}INDEX {} ON {} ({});",
            if index.index_type == IndexType::Bitmap {
                "BITMAP "
            } else {
                ""
            },
            b.escape_identifier(&index.name),
            qualified,
            join_escaped(&b, &index.columns)
        ));
    }
    for col in columns {
        if let Some(comment) = &col.comment {
            if !comment.is_empty() {
                out.push_str(&format!(
                    "\nCOMMENT ON COLUMN {}.{} IS '{}';",
                    qualified,
                    b.escape_identifier(&col.name),
                    quote_literal(comment)
                ));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders_columns(id_type: &str, total_type: &str) -> Vec<ColumnInfo> {
        vec![
            ColumnInfo::new("id", id_type)
                .primary_key()
                .identity()
                .at_position(1),
            ColumnInfo::new("total", total_type)
                .with_precision(10, 2)
                .nullable(true)
                .at_position(2),
        ]
    }

    fn orders_pk(name: &str) -> Vec<IndexInfo> {
        vec![
            IndexInfo::new(name, "orders", "shop")
                .with_type(IndexType::Primary)
                .with_columns(vec!["id".to_string()]),
        ]
    }

    #[test]
    fn test_mysql_ddl_shape() {
        let ddl = mysql_create_table(
            "shop",
            "orders",
            &orders_columns("int", "decimal"),
            &orders_pk("PRIMARY"),
        );
        assert!(ddl.starts_with("CREATE TABLE `shop`.`orders` (\n"));
        assert_eq!(ddl.matches("AUTO_INCREMENT").count(), 1);
        assert_eq!(ddl.matches("PRIMARY KEY").count(), 1);
        assert!(ddl.contains("`total` DECIMAL(10,2)"));
        assert!(ddl.contains("ENGINE=InnoDB"));
    }

    #[test]
    fn test_mysql_secondary_indexes() {
        let columns = orders_columns("int", "decimal");
        let mut indexes = orders_pk("PRIMARY");
        indexes.push(
            IndexInfo::new("uq_total", "orders", "shop")
                .with_type(IndexType::Unique)
                .with_columns(vec!["total".to_string()]),
        );
        indexes.push(
            IndexInfo::new("ix_total", "orders", "shop")
                .with_type(IndexType::Index)
                .with_columns(vec!["total".to_string()]),
        );
        let ddl = mysql_create_table("shop", "orders", &columns, &indexes);
        assert!(ddl.contains("UNIQUE KEY `uq_total` (`total`)"));
        assert!(ddl.contains("KEY `ix_total` (`total`)"));
    }

    #[test]
    fn test_postgres_ddl_shape() {
        let ddl = postgres_create_table(
            "shop",
            "orders",
            &orders_columns("integer", "numeric"),
            &orders_pk("orders_pkey"),
        );
        assert!(ddl.starts_with("CREATE TABLE \"shop\".\"orders\" (\n"));
        assert_eq!(ddl.matches("GENERATED BY DEFAULT AS IDENTITY").count(), 1);
        assert!(ddl.contains("PRIMARY KEY (\"id\")"));
        assert!(ddl.contains("\"total\" NUMERIC(10,2)"));
    }

    #[test]
    fn test_mssql_ddl_shape() {
        let ddl = mssql_create_table(
            "shop",
            "orders",
            &orders_columns("int", "decimal"),
            &orders_pk("PK_orders"),
        );
        assert!(ddl.starts_with("CREATE TABLE [shop].[orders] (\n"));
        assert_eq!(ddl.matches("IDENTITY(1,1)").count(), 1);
        assert!(ddl.contains("CONSTRAINT [PK_orders] PRIMARY KEY CLUSTERED ([id])"));
        assert!(ddl.contains("[total] DECIMAL(10,2) NULL"));
        assert!(ddl.trim_end().ends_with("GO"));
    }

    #[test]
    fn test_mssql_identity_suppresses_default() {
        let mut columns = orders_columns("int", "decimal");
        columns[0] = columns[0].clone().with_default("0");
        let ddl = mssql_create_table("shop", "orders", &columns, &orders_pk("PK_orders"));
        assert!(!ddl.contains("[id] INT IDENTITY(1,1) NOT NULL DEFAULT"));
    }

    fn oracle_columns() -> Vec<ColumnInfo> {
        vec![
            ColumnInfo::new("ID", "number")
                .primary_key()
                .identity()
                .at_position(1),
            ColumnInfo::new("TOTAL", "number")
                .with_precision(10, 2)
                .nullable(true)
                .at_position(2),
        ]
    }

    #[test]
    fn test_oracle_ddl_shape() {
        let indexes = vec![
            IndexInfo::new("PK_ORDERS", "ORDERS", "SHOP")
                .with_type(IndexType::Primary)
                .with_columns(vec!["ID".to_string()]),
        ];
        let ddl = oracle_create_table("SHOP", "ORDERS", &oracle_columns(), &indexes);
        assert!(ddl.starts_with("CREATE TABLE SHOP.ORDERS (\n"));
        assert_eq!(ddl.matches("GENERATED BY DEFAULT AS IDENTITY").count(), 1);
        assert!(ddl.contains("CONSTRAINT PK_ORDERS PRIMARY KEY (ID)"));
    }

    #[test]
    fn test_oracle_comments_appended() {
        let mut columns = oracle_columns();
        columns[1] = columns[1].clone().with_comment("order total");
        let ddl = oracle_create_table("SHOP", "ORDERS", &columns, &[]);
        assert!(ddl.contains("COMMENT ON COLUMN SHOP.ORDERS.TOTAL IS 'order total';"));
    }

    #[test]
    fn test_pk_falls_back_to_column_flags() {
        let ddl = mysql_create_table("shop", "orders", &orders_columns("int", "decimal"), &[]);
        assert!(ddl.contains("PRIMARY KEY (`id`)"));
    }
}
