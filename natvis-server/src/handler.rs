//! Request handler for natvis-server

use std::path::Path;

use natvis_core::expand::{Child, ChildValue};
use natvis_core::introspect::{Introspector, Snapshot, ValueHandle};
use natvis_core::protocol::{ChildInfo, TypeRef, ValueRef};
use natvis_core::{Config, DocumentStore, PrintDriver, Request, Response};
use tracing::{debug, info, warn};

pub struct Handler {
    config: Config,
    store: DocumentStore,
}

impl Handler {
    pub fn new(config: Config) -> Self {
        let mut handler = Self {
            config,
            store: DocumentStore::new(),
        };
        handler.load_configured();
        handler
    }

    pub fn handle(&mut self, request: &Request) -> Response {
        match request {
            Request::Initialize { config } => self.handle_initialize(config.as_ref()),
            Request::Load { path, content } => {
                self.handle_load(path.as_deref(), content.as_deref())
            }
            Request::Print {
                snapshot,
                value,
                max_children,
            } => self.handle_print(snapshot, value, *max_children),
            Request::Shutdown => {
                info!("Shutdown requested");
                Response::success()
            }
        }
    }

    /// Load the documents named in the configuration. A file that fails to
    /// load is skipped.
    fn load_configured(&mut self) {
        for path in &self.config.server.documents {
            match self.store.load_file(path) {
                Ok(Some(_)) => info!("Loaded {}", path.display()),
                Ok(None) => debug!("{} already loaded", path.display()),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }
    }

    fn handle_initialize(&mut self, config: Option<&Config>) -> Response {
        if let Some(config) = config {
            info!("Applying configuration from client");
            self.config = config.clone();
        }
        self.load_configured();
        info!("{} visualizer rules available", self.store.rule_count());
        Response::success()
    }

    fn handle_load(&mut self, path: Option<&Path>, content: Option<&str>) -> Response {
        let result = match (path, content) {
            (Some(path), _) => self.store.load_file(path),
            (None, Some(content)) => self.store.load_str(content, "<inline>").map(Some),
            (None, None) => return Response::error("load needs 'path' or 'content'"),
        };

        match result {
            Ok(Some(index)) => {
                let Some(document) = self.store.documents().get(index) else {
                    return Response::error(format!("Document {} not found after load", index));
                };
                info!("Loaded {} ({} rules)", document.source, document.rules.len());
                Response::Loaded {
                    source: document.source.clone(),
                    rules: document.rules.len(),
                    diagnostics: document.diagnostics.iter().map(|d| d.to_string()).collect(),
                }
            }
            Ok(None) => Response::success(),
            Err(e) => Response::error(e.to_string()),
        }
    }

    fn handle_print(
        &self,
        snapshot: &Snapshot,
        value: &ValueRef,
        max_children: Option<usize>,
    ) -> Response {
        let ty = match &value.ty {
            TypeRef::Id(id) => *id,
            TypeRef::Name(name) => match snapshot.lookup_type(name) {
                Some(id) => id,
                None => return Response::error(format!("Unknown type '{}'", name)),
            },
        };
        let handle = ValueHandle::new(value.address, ty);
        let limit = max_children.unwrap_or(self.config.server.max_children);
        debug!("Print request: 0x{:x} (type {})", handle.address, ty.0);

        let driver = PrintDriver::new(&self.store, snapshot, &self.config.engine);
        let printed = match driver.print(&handle) {
            Ok(printed) => printed,
            Err(e) => {
                debug!("{}, using default formatting", e);
                return Response::printed_default(driver.display(&handle));
            }
        };

        let matched = self.store.rule(printed.rule).map(|rule| rule.name.clone());
        let mut children = printed.children;
        let infos: Vec<ChildInfo> = children
            .by_ref()
            .take(limit)
            .map(|child| child_info(&driver, child))
            .collect();
        let truncated = infos.len() == limit && children.next().is_some();

        Response::Printed {
            display: printed.display,
            matched,
            children: infos,
            truncated,
        }
    }
}

fn child_info(driver: &PrintDriver<'_>, child: Child) -> ChildInfo {
    let display = driver.format_child(&child);
    let (expandable, value) = match &child.value {
        ChildValue::Value(value) => (driver.has_children(value), driver.object_of(value)),
        ChildValue::Text(_) | ChildValue::Error(_) => (false, None),
    };
    ChildInfo {
        name: child.name,
        display,
        expandable,
        value,
    }
}
