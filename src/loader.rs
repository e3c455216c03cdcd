//! Reader for the line-oriented system declaration format.
//!
//! ```text
//! system:NAME
//! event:NAME
//! int:SIZE:MIN:MAX:INIT:NAME
//! clock:SIZE:NAME
//! process:NAME
//! location:PROCESS:NAME{ATTRS}
//! edge:PROCESS:SOURCE:TARGET:EVENT{ATTRS}
//! sync:PROCESS@EVENT:PROCESS@EVENT[:...]
//! ```

use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::expr::{parse_expr, parse_statement, Expr};
use crate::model::{Edge, IntVar, Location, Model, SyncVector};

impl Model {
    pub fn load(path: impl AsRef<Path>) -> Result<Model> {
        let path = path.as_ref();
        debug!("load({})", path.display());
        let text = fs::read_to_string(path)?;
        Model::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Model> {
        let mut model = Model::default();
        let mut named = false;
        for (i, raw) in text.lines().enumerate() {
            let line = match raw.find('#') {
                Some(pos) => &raw[..pos],
                None => raw,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            parse_line(&mut model, &mut named, line).map_err(|message| Error::Load { line: i + 1, message })?;
        }
        if !named {
            return Err(Error::Load {
                line: 0,
                message: "missing `system' declaration".to_string(),
            });
        }
        debug!(
            "parse: system `{}' with {} processes, {} locations, {} edges, {} variables, {} clocks",
            model.name(),
            model.processes().len(),
            model.locations().len(),
            model.edges().len(),
            model.variables().len(),
            model.clocks().len()
        );
        Ok(model)
    }
}

fn split_attributes(line: &str) -> std::result::Result<(&str, &str), String> {
    match line.find('{') {
        None => Ok((line, "")),
        Some(open) => {
            let Some(body) = line[open + 1..].strip_suffix('}') else {
                return Err("unterminated attribute list".to_string());
            };
            Ok((&line[..open], body))
        }
    }
}

fn parse_attributes(body: &str) -> std::result::Result<Vec<(&str, &str)>, String> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let parts: Vec<&str> = body.split(':').map(str::trim).collect();
    if parts.len() % 2 != 0 {
        return Err(format!("malformed attributes `{}'", body));
    }
    Ok(parts.chunks(2).map(|kv| (kv[0], kv[1])).collect())
}

fn parse_int(field: &str, what: &str) -> std::result::Result<i32, String> {
    field
        .trim()
        .parse()
        .map_err(|_| format!("invalid {} `{}'", what, field))
}

fn expect_fields<'a>(head: &'a str, count: usize) -> std::result::Result<Vec<&'a str>, String> {
    let fields: Vec<&str> = head.split(':').map(str::trim).collect();
    if fields.len() != count {
        return Err(format!(
            "`{}' declaration expects {} fields, found {}",
            fields[0],
            count - 1,
            fields.len() - 1
        ));
    }
    if let Some(empty) = fields.iter().position(|f| f.is_empty()) {
        return Err(format!("field {} of `{}' declaration is empty", empty, fields[0]));
    }
    Ok(fields)
}

fn process_id(model: &Model, name: &str) -> std::result::Result<u32, String> {
    model
        .processes()
        .key(name)
        .ok_or_else(|| format!("unknown process `{}'", name))
}

fn event_id(model: &Model, name: &str) -> std::result::Result<u32, String> {
    model
        .events()
        .key(name)
        .ok_or_else(|| format!("unknown event `{}'", name))
}

fn location_id(model: &Model, pid: u32, name: &str) -> std::result::Result<u32, String> {
    model.location(pid, name).ok_or_else(|| {
        format!(
            "unknown location `{}' of process `{}'",
            name,
            model.processes().value(pid)
        )
    })
}

fn parse_line(model: &mut Model, named: &mut bool, line: &str) -> std::result::Result<(), String> {
    let (head, body) = split_attributes(line)?;
    let kind = head.split(':').next().unwrap_or_default().trim();
    match kind {
        "system" => {
            let f = expect_fields(head, 2)?;
            if *named {
                return Err("duplicate `system' declaration".to_string());
            }
            model.set_name(f[1]);
            *named = true;
        }
        "event" => {
            let f = expect_fields(head, 2)?;
            model.add_event(f[1])?;
        }
        "int" => {
            let f = expect_fields(head, 6)?;
            if parse_int(f[1], "size")? != 1 {
                return Err(format!("array variable `{}' is not supported", f[5]));
            }
            let var = IntVar {
                min: parse_int(f[2], "lower bound")?,
                max: parse_int(f[3], "upper bound")?,
                initial: parse_int(f[4], "initial value")?,
            };
            model.add_intvar(f[5], var)?;
        }
        "clock" => {
            let f = expect_fields(head, 3)?;
            if parse_int(f[1], "size")? != 1 {
                return Err(format!("clock array `{}' is not supported", f[2]));
            }
            model.add_clock(f[2])?;
        }
        "process" => {
            let f = expect_fields(head, 2)?;
            model.add_process(f[1])?;
        }
        "location" => {
            let f = expect_fields(head, 3)?;
            let pid = process_id(model, f[1])?;
            let mut location = Location {
                id: 0,
                pid,
                name: f[2].to_string(),
                initial: false,
                committed: false,
                invariant: Expr::TRUE,
            };
            for (key, value) in parse_attributes(body)? {
                match key {
                    "initial" => location.initial = true,
                    "committed" => location.committed = true,
                    "invariant" => location.invariant = parse_expr(value, &|n| model.resolve(n))?,
                    // Neither changes the discrete transition relation.
                    "urgent" | "labels" => debug!("location `{}': attribute `{}' has no effect", f[2], key),
                    _ => warn!("location `{}': ignoring attribute `{}'", f[2], key),
                }
            }
            model.add_location(location)?;
        }
        "edge" => {
            let f = expect_fields(head, 5)?;
            let pid = process_id(model, f[1])?;
            let src = location_id(model, pid, f[2])?;
            let tgt = location_id(model, pid, f[3])?;
            let event = event_id(model, f[4])?;
            let mut guard = Expr::TRUE;
            let mut updates = Vec::new();
            for (key, value) in parse_attributes(body)? {
                match key {
                    "provided" => guard = parse_expr(value, &|n| model.resolve(n))?,
                    "do" => updates = parse_statement(value, &|n| model.resolve(n))?,
                    _ => warn!("edge {}->{}: ignoring attribute `{}'", f[2], f[3], key),
                }
            }
            model.add_edge(Edge {
                id: 0,
                pid,
                src,
                tgt,
                event,
                guard,
                updates,
            })?;
        }
        "sync" => {
            let fields: Vec<&str> = head.split(':').map(str::trim).skip(1).collect();
            if fields.len() < 2 {
                return Err("a synchronisation needs at least two processes".to_string());
            }
            let mut constraints = Vec::with_capacity(fields.len());
            for field in fields {
                let Some((process, event)) = field.split_once('@') else {
                    return Err(format!("expected PROCESS@EVENT, found `{}'", field));
                };
                if event.ends_with('?') {
                    return Err(format!("weak synchronisation `{}' is not supported", field));
                }
                constraints.push((process_id(model, process.trim())?, event_id(model, event.trim())?));
            }
            model.add_sync(SyncVector { constraints })?;
        }
        _ => return Err(format!("unknown declaration `{}'", kind)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::expr::{Symbol, Update};

    const SMALL: &str = "
        # two processes sharing a flag
        system:small
        event:a
        event:b
        int:1:0:3:1:v
        clock:1:x
        process:P
        location:P:p0{initial: : labels: start, home}
        location:P:p1{invariant: x<=2}
        edge:P:p0:p1:a{provided: v>0 : do: v=v-1; x=0}
        process:Q
        location:Q:q0{initial:}
        edge:Q:q0:q0:a
        sync:P@a:Q@a
    ";

    #[test]
    fn test_parse_small() {
        let model = Model::parse(SMALL).unwrap();
        assert_eq!(model.name(), "small");
        assert_eq!(model.events().len(), 2);
        assert_eq!(model.processes().key("Q"), Some(1));
        assert_eq!(model.locations().len(), 3);
        assert_eq!(
            *model.intvar(0),
            IntVar {
                min: 0,
                max: 3,
                initial: 1
            }
        );

        let p0 = &model.locations()[0];
        assert!(p0.initial);
        assert!(!p0.committed);
        assert!(model.locations()[1].invariant.mentions_clock());

        let edge = &model.edges()[0];
        assert_eq!(edge.updates.len(), 2);
        assert!(matches!(edge.updates[1], Update::Clock(0, _)));
        assert!(model.is_synchronized(0, 0));
        assert!(!model.is_synchronized(0, 1));
        assert_eq!(model.resolve("v"), Some(Symbol::Int(0)));
        assert_eq!(model.resolve("x"), Some(Symbol::Clock(0)));
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let text = "system:s\nprocess:P\nlocation:P:a{initial:}\nedge:P:a:b:e\n";
        match Model::parse(text) {
            Err(Error::Load { line, message }) => {
                assert_eq!(line, 4);
                assert!(message.contains("`b'"), "{}", message);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejected_declarations() {
        for text in [
            "system:s\nint:2:0:1:0:arr\n",
            "system:s\nfoo:bar\n",
            "system:s\nprocess:P\nlocation:P:a{initial:\n",
            "system:s\nevent:e\nprocess:P\nsync:P@e\n",
            "system:s\nevent:e\nprocess:P\nprocess:Q\nsync:P@e:Q@e?\n",
            "system:s\nsystem:t\n",
            "process:P\n",
        ] {
            assert!(Model::parse(text).is_err(), "accepted {:?}", text);
        }
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Model::load("/nonexistent/model.tck"),
            Err(Error::Io(_))
        ));
    }
}
