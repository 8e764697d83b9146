//! Capture a small call stack and write it as a snapshot.
//!
//! ```bash
//! cargo run -p postmortem --example dump_stack -- /tmp/demo.dump
//! cargo run -p postmortem -- show /tmp/demo.dump --all-locals
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use postmortem_core::object::{self, Code, Dict, Frame, Instance, ObjRef};
use postmortem_core::prelude::*;
use postmortem_utils::{info, init_logging, LogConfig, LogLevel};

fn main() -> std::result::Result<(), Box<dyn std::error::Error>>
{
    let _guard = init_logging(&LogConfig::from_env().with_level(LogLevel::Info))?;
    let output = std::env::args().nth(1).map(PathBuf::from);

    let request: ObjRef = Instance::of_class("Request")
        .with_attr("path", object::string("/orders/42"))
        .with_attr("token", object::string("4f9c2a7be1d04c6f8a3e5b7d9c1f2a4b"));
    let handler = Frame::new(
        Code::new("handle", "app.py", 10),
        14,
        Dict::new(vec![(object::string("request"), request.clone())]),
        Dict::new(Vec::new()),
        None,
    );
    let items = object::list(vec![object::int(3), object::int(0)]);
    let compute = Frame::new(
        Code::new("average", "app.py", 20),
        23,
        Dict::new(vec![
            (object::string("items"), items),
            (object::string("request"), request),
        ]),
        Dict::new(Vec::new()),
        Some(handler),
    );

    let registry = Arc::new(TypeRegistry::with_builtins(Arc::new(RedactionPolicy::from_env())));
    let options = CaptureOptions::default().with_description("ZeroDivisionError: division by zero");
    let path = Snapshot::dump(&registry, &compute, &options, output.as_deref(), None)?;
    info!(path = %path.display(), "demo snapshot written");
    println!("{}", path.display());
    Ok(())
}
