use anyhow::{Context, Result};
use log::kv::{Key, Value as KvValue, VisitSource};
use log::{LevelFilter, Record};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// Route every log record to `log_file` (truncated) and stdout, one JSON object per line.
///
/// `RUST_LOG` is honoured unless `level` forces a filter.
pub fn init(log_file: &Path, level: Option<LevelFilter>) -> Result<()> {
    let file = File::create(log_file)
        .with_context(|| format!("Couldn't open log file {}", log_file.display()))?;

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder
        .format(|buf, record| {
            let line = render_record(record, buf.timestamp_millis().to_string());
            writeln!(buf, "{line}")
        })
        .target(env_logger::Target::Pipe(Box::new(Tee {
            file,
            stdout: io::stdout(),
        })))
        .try_init()
        .context("Couldn't install logger")?;
    Ok(())
}

pub(crate) fn render_record(record: &Record<'_>, time: String) -> Value {
    let mut fields = Map::new();
    fields.insert("time".to_string(), Value::String(time));
    fields.insert(
        "level".to_string(),
        Value::String(record.level().as_str().to_string()),
    );
    fields.insert(
        "target".to_string(),
        Value::String(record.target().to_string()),
    );
    fields.insert("msg".to_string(), Value::String(record.args().to_string()));

    let _ = record.key_values().visit(&mut JsonFields(&mut fields));
    Value::Object(fields)
}

struct JsonFields<'a>(&'a mut Map<String, Value>);

impl<'kvs> VisitSource<'kvs> for JsonFields<'_> {
    fn visit_pair(&mut self, key: Key<'kvs>, value: KvValue<'kvs>) -> Result<(), log::kv::Error> {
        let json = if let Some(n) = value.to_u64() {
            Value::from(n)
        } else if let Some(n) = value.to_i64() {
            Value::from(n)
        } else if let Some(b) = value.to_bool() {
            Value::Bool(b)
        } else {
            Value::String(value.to_string())
        };
        self.0.insert(key.as_str().to_string(), json);
        Ok(())
    }
}

/// Writes the same bytes to the log file and stdout; stdout failures are ignored.
struct Tee {
    file: File,
    stdout: io::Stdout,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write_all(buf)?;
        let _ = self.stdout.write_all(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = self.stdout.flush();
        self.file.flush()
    }
}
