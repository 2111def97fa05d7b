//! Command handlers.
//!
//! Each handler returns the lines to print so it can be exercised without a
//! terminal.

use anyhow::{bail, Context};
use oxide_lazy_orm::{
    Condition, Connection, Lookup, Operand, Record, Registry, SqlValue, SqliteDatabase,
};
use tracing::info;

/// Splits a `key=value` argument.
pub fn parse_assignment(arg: &str) -> anyhow::Result<(String, String)> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => bail!("expected key=value, got '{arg}'"),
    }
}

/// Parses filter arguments. `in` lookups take a comma separated list.
pub fn parse_predicates(args: &[String]) -> anyhow::Result<Vec<(String, Operand)>> {
    args.iter()
        .map(|arg| -> anyhow::Result<(String, Operand)> {
            let (key, value) = parse_assignment(arg)?;
            let (_, lookup) = Condition::split_key(&key)?;
            let operand = match lookup {
                Lookup::In if value.is_empty() => Operand::List(Vec::new()),
                Lookup::In => {
                    Operand::from(value.split(',').map(str::to_string).collect::<Vec<_>>())
                }
                _ if value == "null" => Operand::Value(SqlValue::Null),
                _ => Operand::from(value),
            };
            Ok((key, operand))
        })
        .collect()
}

/// Renders a record as `<Type id> field=value ...`.
pub fn render(record: &Record) -> String {
    let mut line = record.to_string();
    for (name, value) in record.values() {
        line.push_str(&format!(" {name}={value}"));
    }
    line
}

/// Options for the `query` command.
#[derive(Debug, Default)]
pub struct QueryOptions {
    pub filters: Vec<String>,
    pub order_by: Vec<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    pub reverse: bool,
}

/// Creates the tables of every registered record type.
pub fn init(registry: &Registry, db: &mut SqliteDatabase) -> anyhow::Result<Vec<String>> {
    let mut lines = Vec::new();
    for name in registry.names() {
        let schema = registry
            .get(name)
            .with_context(|| format!("record type '{name}' vanished"))?;
        db.create_table(&schema)?;
        info!(table = %schema.table_name(), "Created table");
        lines.push(format!("{name}: {}", schema.table_name()));
    }
    Ok(lines)
}

/// Lists the registered record types and their fields.
pub fn models(registry: &Registry) -> Vec<String> {
    registry
        .names()
        .into_iter()
        .filter_map(|name| registry.get(name))
        .map(|schema| {
            let fields: Vec<String> = schema
                .fields()
                .map(|(name, field)| {
                    let marker = if field.is_required() { "!" } else { "" };
                    format!("{name}:{}{marker}", field.field_type())
                })
                .collect();
            format!(
                "{} ({}) {}",
                schema.name(),
                schema.table_name(),
                fields.join(" ")
            )
        })
        .collect()
}

/// Runs a query built from `options` and renders each row.
pub fn query<C: Connection>(
    registry: &Registry,
    conn: &mut C,
    model: &str,
    options: QueryOptions,
) -> anyhow::Result<Vec<String>> {
    let mut qs = registry
        .objects(model)?
        .filter(parse_predicates(&options.filters)?)?;
    if !options.order_by.is_empty() {
        qs = qs.order_by(&options.order_by)?;
    }
    qs = match (options.offset, options.limit) {
        (None, None) => qs,
        (start, None) => qs.slice(start.unwrap_or(0)..),
        (start, Some(limit)) => {
            let start = start.unwrap_or(0);
            qs.slice(start..start.saturating_add(limit))
        }
    };

    qs.fetch(conn)?;
    if options.reverse {
        qs = qs.reverse();
    }
    Ok(qs.results().unwrap_or_default().iter().map(render).collect())
}

/// Counts the rows matching `filters`.
pub fn count<C: Connection>(
    registry: &Registry,
    conn: &mut C,
    model: &str,
    filters: &[String],
) -> anyhow::Result<u64> {
    let mut qs = registry.objects(model)?.filter(parse_predicates(filters)?)?;
    Ok(qs.count(conn)?)
}

/// Fetches the single row matching `filters`.
pub fn get<C: Connection>(
    registry: &Registry,
    conn: &mut C,
    model: &str,
    filters: &[String],
) -> anyhow::Result<String> {
    let record = registry
        .objects(model)?
        .get(conn, parse_predicates(filters)?)?;
    Ok(render(&record))
}

/// Inserts a row from `field=value` assignments and renders it.
pub fn create<C: Connection>(
    registry: &Registry,
    conn: &mut C,
    model: &str,
    values: &[String],
) -> anyhow::Result<String> {
    let values = values
        .iter()
        .map(|arg| parse_assignment(arg))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let record = registry.objects(model)?.create(conn, values)?;
    Ok(render(&record))
}

/// Deletes the row with identity `id`.
pub fn delete<C: Connection>(
    registry: &Registry,
    conn: &mut C,
    model: &str,
    id: i64,
) -> anyhow::Result<String> {
    let record = registry.objects(model)?.get(conn, [("id", id)])?;
    record.delete(conn)?;
    Ok(format!("deleted {record}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_lazy_orm::Settings;

    const MODELS: &str = r#"{ "models": [ { "name": "User", "table": "users",
        "ordering": ["name"],
        "fields": [
            { "name": "name", "type": "text", "required": true },
            { "name": "age", "type": "integer" }
        ] } ] }"#;

    fn setup() -> (Registry, SqliteDatabase) {
        let registry = Settings::from_json(MODELS).unwrap().into_registry().unwrap();
        let mut db = SqliteDatabase::in_memory().unwrap();
        init(&registry, &mut db).unwrap();
        (registry, db)
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_assignment() {
        assert_eq!(
            parse_assignment("age__ge=21").unwrap(),
            ("age__ge".to_string(), "21".to_string())
        );
        assert_eq!(parse_assignment("note=a=b").unwrap().1, "a=b");
        assert!(parse_assignment("age").is_err());
        assert!(parse_assignment("=3").is_err());
    }

    #[test]
    fn test_parse_predicates() {
        let parsed = parse_predicates(&args(&["name__in=a,b", "age=null"])).unwrap();
        assert_eq!(
            parsed[0].1,
            Operand::List(vec![SqlValue::Text("a".into()), SqlValue::Text("b".into())])
        );
        assert_eq!(parsed[1].1, Operand::Value(SqlValue::Null));
        assert!(parse_predicates(&args(&["a__b__c=1"])).is_err());
    }

    #[test]
    fn test_commands_end_to_end() {
        let (registry, mut db) = setup();
        assert_eq!(models(&registry), vec!["User (users) name:text! age:integer"]);

        let alice = create(&registry, &mut db, "User", &args(&["name=alice", "age=30"])).unwrap();
        assert_eq!(alice, "<User 1> name=alice age=30");
        create(&registry, &mut db, "User", &args(&["name=bob", "age=20"])).unwrap();

        let rows = query(
            &registry,
            &mut db,
            "User",
            QueryOptions {
                filters: args(&["age__ge=18"]),
                reverse: true,
                ..QueryOptions::default()
            },
        )
        .unwrap();
        assert_eq!(rows, vec!["<User 2> name=bob age=20", "<User 1> name=alice age=30"]);

        let page = query(
            &registry,
            &mut db,
            "User",
            QueryOptions {
                order_by: args(&["-age"]),
                limit: Some(1),
                ..QueryOptions::default()
            },
        )
        .unwrap();
        assert_eq!(page, vec!["<User 1> name=alice age=30"]);

        assert_eq!(count(&registry, &mut db, "User", &[]).unwrap(), 2);
        assert_eq!(
            get(&registry, &mut db, "User", &args(&["name=bob"])).unwrap(),
            "<User 2> name=bob age=20"
        );
        assert_eq!(delete(&registry, &mut db, "User", 2).unwrap(), "deleted <User 2>");
        assert!(get(&registry, &mut db, "User", &args(&["name=bob"])).is_err());
        assert!(count(&registry, &mut db, "Nope", &[]).is_err());
    }
}
