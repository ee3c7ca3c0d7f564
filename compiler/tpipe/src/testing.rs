//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tpipe_model::{
    CodeEmitter, CustomAttribute, DefaultMutableTypeFactory, EmitError, EmitErrorKind, Expr,
    FieldDecl, FlushedModule, GeneratedCodeFlusher, ModuleEmitter, MutableTypeArena, MutableTypeId,
    RuntimeType, StaticType, Value,
};

use crate::assembler::TypeAssembler;
use crate::context::ProxyTypeAssemblyContext;
use crate::participant::{Participant, ParticipantError, TypeIdentifierProvider};
use crate::pool::{
    AssemblyContext, AssemblyContextPool, BlockingAssemblyContextPool,
    ThreadLocalAssemblyContextPoolDecorator,
};
use crate::serialization::NoopSerializationEnabler;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmitEvent {
    Declare(String),
    Define(String),
    Create(String),
    Flush,
}

/// Shared record of everything a [`RecordingEmitter`] was asked to do.
#[derive(Clone, Default)]
pub struct EmitLog(Arc<Mutex<Vec<EmitEvent>>>);

impl EmitLog {
    pub fn events(&self) -> Vec<EmitEvent> {
        self.0.lock().clone()
    }

    pub fn created(&self) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter_map(|e| match e {
                EmitEvent::Create(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: EmitEvent) {
        self.0.lock().push(event);
    }
}

/// A [`ModuleEmitter`] that logs every call and can be told to fail.
pub struct RecordingEmitter {
    inner: ModuleEmitter,
    log: EmitLog,
    fail_create: Option<(String, EmitErrorKind)>,
}

impl RecordingEmitter {
    pub fn new(log: EmitLog) -> Self {
        RecordingEmitter {
            inner: ModuleEmitter::new("Test_{counter}"),
            log,
            fail_create: None,
        }
    }

    #[must_use]
    pub fn failing_on(mut self, full_name: &str, kind: EmitErrorKind) -> Self {
        self.fail_create = Some((full_name.to_owned(), kind));
        self
    }
}

impl CodeEmitter for RecordingEmitter {
    fn declare_type(
        &mut self,
        arena: &MutableTypeArena,
        id: MutableTypeId,
    ) -> Result<(), EmitError> {
        let name = arena[id].full_name().to_owned();
        self.log.push(EmitEvent::Declare(name));
        self.inner.declare_type(arena, id)
    }

    fn define_type_facets(
        &mut self,
        arena: &MutableTypeArena,
        id: MutableTypeId,
    ) -> Result<(), EmitError> {
        let name = arena[id].full_name().to_owned();
        self.log.push(EmitEvent::Define(name));
        self.inner.define_type_facets(arena, id)
    }

    fn create_type(
        &mut self,
        arena: &MutableTypeArena,
        id: MutableTypeId,
    ) -> Result<RuntimeType, EmitError> {
        let name = arena[id].full_name().to_owned();
        if let Some((failing, kind)) = &self.fail_create {
            if *failing == name {
                return Err(EmitError::new(*kind, format!("cannot create '{name}'")));
            }
        }
        self.log.push(EmitEvent::Create(name));
        self.inner.create_type(arena, id)
    }
}

impl GeneratedCodeFlusher for RecordingEmitter {
    fn flush_code(
        &mut self,
        attributes: &[CustomAttribute],
    ) -> Result<Option<FlushedModule>, EmitError> {
        self.log.push(EmitEvent::Flush);
        self.inner.flush_code(attributes)
    }
}

/// Adds one instance field to every proxy and counts its runs.
#[derive(Default)]
pub struct FieldAdder {
    pub runs: AtomicUsize,
}

impl FieldAdder {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Participant for FieldAdder {
    fn name(&self) -> &str {
        "FieldAdder"
    }

    fn participate(
        &self,
        _id_part: Option<&Value>,
        context: &mut ProxyTypeAssemblyContext<'_>,
    ) -> Result<(), ParticipantError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        context
            .proxy_mut()
            .add_field(FieldDecl::instance("added", StaticType::Object));
        Ok(())
    }
}

/// Leaves the proxy alone and counts its runs.
#[derive(Default)]
pub struct Bystander {
    pub runs: AtomicUsize,
}

impl Bystander {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Participant for Bystander {
    fn name(&self) -> &str {
        "Bystander"
    }

    fn participate(
        &self,
        _id_part: Option<&Value>,
        _context: &mut ProxyTypeAssemblyContext<'_>,
    ) -> Result<(), ParticipantError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn domain_type(name: &str) -> RuntimeType {
    RuntimeType::builder(name).namespace("Domain").build()
}

/// Contributes a fixed identity part and records the parts it was given.
pub struct Tagger {
    name: &'static str,
    tag: Option<Value>,
    valid_flat_expression: bool,
    seen: Mutex<Vec<Option<Value>>>,
}

impl Tagger {
    pub fn new(name: &'static str, tag: Option<Value>) -> Self {
        Tagger {
            name,
            tag,
            valid_flat_expression: true,
            seen: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_invalid_flat_expression(mut self) -> Self {
        self.valid_flat_expression = false;
        self
    }

    pub fn seen(&self) -> Vec<Option<Value>> {
        self.seen.lock().clone()
    }
}

impl TypeIdentifierProvider for Tagger {
    fn get_id(&self, _requested_type: &RuntimeType) -> Option<Value> {
        self.tag.clone()
    }

    fn get_expression(&self, id: &Value) -> Option<Expr> {
        Some(Expr::Constant(id.clone()))
    }

    fn get_flat_value_expression_for_serialization(&self, id: &Value) -> Option<Expr> {
        if self.valid_flat_expression {
            Some(Expr::flat_value(Expr::Constant(id.clone())))
        } else {
            Some(Expr::Constant(id.clone()))
        }
    }
}

impl Participant for Tagger {
    fn name(&self) -> &str {
        self.name
    }

    fn partial_type_identifier_provider(&self) -> Option<&dyn TypeIdentifierProvider> {
        Some(self)
    }

    fn participate(
        &self,
        id_part: Option<&Value>,
        context: &mut ProxyTypeAssemblyContext<'_>,
    ) -> Result<(), ParticipantError> {
        self.seen.lock().push(id_part.cloned());
        if id_part.is_some() {
            let field = FieldDecl::instance(format!("tag_{}", self.name), StaticType::Object);
            context.proxy_mut().add_field(field);
        }
        Ok(())
    }
}

pub fn participants(list: Vec<Arc<dyn Participant>>) -> Arc<[Arc<dyn Participant>]> {
    list.into()
}

/// A thread-reentrant pool of `count` contexts logging into `log`.
pub fn recording_pool(log: &EmitLog, count: usize) -> Arc<dyn AssemblyContextPool> {
    let contexts = (0..count)
        .map(|_| {
            let emitter = RecordingEmitter::new(log.clone());
            Arc::new(AssemblyContext::new(Box::new(emitter)))
        })
        .collect();
    let pool = BlockingAssemblyContextPool::new(contexts).unwrap();
    Arc::new(ThreadLocalAssemblyContextPoolDecorator::new(pool))
}

pub fn assembler_with(list: Vec<Arc<dyn Participant>>) -> Arc<TypeAssembler> {
    Arc::new(TypeAssembler::new(
        "config",
        participants(list),
        Arc::new(DefaultMutableTypeFactory::new()),
        Arc::new(NoopSerializationEnabler),
    ))
}
