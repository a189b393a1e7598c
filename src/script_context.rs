use boa_engine::native_function::NativeFunction;
use boa_engine::object::ObjectInitializer;
use boa_engine::property::{Attribute, PropertyDescriptor};
use boa_engine::{
    Context, JsError, JsNativeError, JsObject, JsResult, JsString, JsValue, Script, Source,
};
use fancy_regex::Regex;
use std::sync::OnceLock;

use crate::capability::{Capability, HostFunction, HostValue, Member, ObjectKind};
use crate::trace::Tracer;
use crate::{Error, Result};

const EVAL_STACK_SIZE: usize = 32 * 1024 * 1024;

static IDENTIFIER: OnceLock<Regex> = OnceLock::new();

/// One isolated script-evaluation environment.
///
/// Globals defined by a bind or an evaluation stay visible to every later
/// evaluation until the context is released.
pub struct ScriptContext {
    engine: Option<Context>,
    bound_names: Vec<String>,
    tracer: Tracer,
}

impl ScriptContext {
    pub(crate) fn new(tracer: Tracer) -> Self {
        tracer.line("[context] created".into());
        Self {
            engine: Some(Context::default()),
            bound_names: Vec::new(),
            tracer,
        }
    }

    /// Binds `capability` under its global name.
    ///
    /// Without `allow_override`, a name already bound through this context or
    /// already defined by the engine is rejected with [`Error::DuplicateName`]
    /// and nothing changes. On success the bootstrap source, if any, runs
    /// immediately; its failure is reported as [`Error::ScriptExecution`]
    /// while the binding itself stays in place.
    pub fn bind_capability(&mut self, capability: &Capability, allow_override: bool) -> Result<()> {
        let name = capability.global_name();
        if name.is_empty() {
            return Err(Error::InvalidConfig(
                "capability global name must not be empty".into(),
            ));
        }
        let engine = self.engine.as_mut().ok_or(Error::ContextClosed)?;

        if !allow_override && self.bound_names.iter().any(|bound| bound == name) {
            return Err(Error::DuplicateName(format!(
                "global `{name}` is already bound in this context"
            )));
        }
        if !allow_override && global_exists(engine, name)? {
            return Err(Error::DuplicateName(format!(
                "global `{name}` is already defined by the script engine"
            )));
        }

        let object = build_host_object(capability, engine);
        install_global(engine, name, object)
            .map_err(|err| Error::ScriptExecution(err.to_string()))?;
        if allow_override && is_identifier(name)? {
            // A top-level `let`/`const`/`class` shadows the global object.
            let sync = format!(
                "if ({name} !== globalThis[\"{name}\"]) {{ {name} = globalThis[\"{name}\"]; }}"
            );
            if let Some(Err(err)) = eval_if_parses(engine, &sync) {
                return Err(Error::ScriptExecution(err.to_string()));
            }
        }

        if let Some(position) = self.bound_names.iter().position(|bound| bound == name) {
            self.bound_names.remove(position);
        }
        self.bound_names.push(name.to_string());
        self.tracer.line(format!(
            "[capability] bound name={name} members={} override={allow_override}",
            capability.members().len()
        ));

        if let Some(source) = capability.bootstrap_source() {
            self.execute(source)?;
        }
        Ok(())
    }

    /// Runs `source` in the persistent namespace and returns its completion
    /// value.
    ///
    /// Object results are summarized without calling back into script, so no
    /// page code runs after `source` itself has finished.
    pub fn evaluate(&mut self, source: &str) -> Result<HostValue> {
        let engine = self.engine.as_mut().ok_or(Error::ContextClosed)?;
        match eval_source(engine, source) {
            Ok(value) => Ok(from_js_value(&value, engine)),
            Err(err) => Err(self.script_error(&err)),
        }
    }

    /// Like [`Self::evaluate`] but discards the completion value.
    pub fn execute(&mut self, source: &str) -> Result<()> {
        let engine = self.engine.as_mut().ok_or(Error::ContextClosed)?;
        eval_source(engine, source)
            .map(drop)
            .map_err(|err| self.script_error(&err))
    }

    fn script_error(&self, err: &JsError) -> Error {
        let message = err.to_string();
        self.tracer.line(format!("[script] error {message}"));
        Error::ScriptExecution(message)
    }

    /// Tears down the engine. A second call fails with
    /// [`Error::ContextClosed`], as does every later bind or evaluation.
    pub fn release(&mut self) -> Result<()> {
        if self.release_if_open() {
            Ok(())
        } else {
            Err(Error::ContextClosed)
        }
    }

    pub(crate) fn release_if_open(&mut self) -> bool {
        let Some(engine) = self.engine.take() else {
            return false;
        };
        drop(engine);
        self.tracer.line(format!(
            "[context] released bound={}",
            self.bound_names.len()
        ));
        true
    }

    pub fn is_released(&self) -> bool {
        self.engine.is_none()
    }

    /// Names bound through [`Self::bind_capability`], in binding order.
    pub fn bound_names(&self) -> &[String] {
        &self.bound_names
    }

    /// Whether `name` resolves in the global scope, whoever defined it.
    /// Top-level lexical declarations count alongside global object
    /// properties.
    pub fn has_global(&mut self, name: &str) -> Result<bool> {
        let engine = self.engine.as_mut().ok_or(Error::ContextClosed)?;
        global_exists(engine, name)
    }
}

impl std::fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptContext")
            .field("bound_names", &self.bound_names)
            .field("released", &self.is_released())
            .finish()
    }
}

fn eval_source(engine: &mut Context, source: &str) -> JsResult<JsValue> {
    stacker::grow(EVAL_STACK_SIZE, || {
        let result = engine.eval(Source::from_bytes(source));
        engine.run_jobs();
        result
    })
}

/// Evaluates `source` only if it parses. Reserved words pass the identifier
/// check but can't be referenced, so code built from them is skipped.
fn eval_if_parses(engine: &mut Context, source: &str) -> Option<JsResult<JsValue>> {
    let script = Script::parse(Source::from_bytes(source), None, engine).ok()?;
    Some(stacker::grow(EVAL_STACK_SIZE, || {
        let result = script.evaluate(engine);
        engine.run_jobs();
        result
    }))
}

fn identifier_pattern() -> Result<&'static Regex> {
    if let Some(regex) = IDENTIFIER.get() {
        return Ok(regex);
    }
    let regex = Regex::new(r"^[\p{L}_$][\p{L}\p{N}_$]*$")
        .map_err(|err| Error::InvalidConfig(format!("invalid identifier pattern: {err}")))?;
    Ok(IDENTIFIER.get_or_init(|| regex))
}

fn is_identifier(name: &str) -> Result<bool> {
    identifier_pattern()?
        .is_match(name)
        .map_err(|err| Error::InvalidConfig(format!("identifier check failed on {name}: {err}")))
}

/// Global object property or top-level lexical binding named `name`.
fn global_exists(engine: &mut Context, name: &str) -> Result<bool> {
    let on_global_object = engine
        .global_object()
        .has_property(JsString::from(name), engine)
        .map_err(|err| Error::ScriptExecution(err.to_string()))?;
    if on_global_object {
        return Ok(true);
    }
    if !is_identifier(name)? {
        return Ok(false);
    }
    // `typeof` only throws for a binding still in its temporal dead zone.
    let lexical_check = format!(
        "(() => {{ try {{ void {name}; return true; }} catch {{}} \
         try {{ typeof {name}; return false; }} catch {{ return true; }} }})()"
    );
    Ok(matches!(
        eval_if_parses(engine, &lexical_check),
        Some(Ok(value)) if value.as_boolean() == Some(true)
    ))
}

/// Defines `name` on the global object. Non-configurable globals, such as
/// script `var` declarations, can't be redefined and are assigned instead;
/// only non-writable ones fail.
fn install_global(engine: &mut Context, name: &str, object: JsValue) -> JsResult<()> {
    let global = engine.global_object();
    let descriptor = PropertyDescriptor::builder()
        .value(object.clone())
        .writable(true)
        .enumerable(false)
        .configurable(true)
        .build();
    if global
        .define_property_or_throw(JsString::from(name), descriptor, engine)
        .is_ok()
    {
        return Ok(());
    }
    global.set(JsString::from(name), object, true, engine)?;
    Ok(())
}

fn build_host_object(capability: &Capability, engine: &mut Context) -> JsValue {
    let mut initializer = ObjectInitializer::new(engine);
    for (name, member) in capability.members() {
        let key = JsString::from(name.as_str());
        match member {
            Member::Field(value) => {
                initializer.property(key, to_js_value(value), Attribute::all());
            }
            Member::Method { arity, function } => {
                initializer.function(host_method(function.clone()), key, *arity);
            }
        }
    }
    initializer.build().into()
}

fn host_method(function: HostFunction) -> NativeFunction {
    // SAFETY: the closure captures only host data (an `Rc` to a host
    // callback), never a garbage-collected engine value, so nothing it holds
    // needs tracing.
    unsafe {
        NativeFunction::from_closure(move |_this, args, context| {
            let args = args
                .iter()
                .map(|arg| from_js_value(arg, context))
                .collect::<Vec<_>>();
            match function(&args) {
                Ok(value) => Ok(to_js_value(&value)),
                Err(message) => Err(JsNativeError::error().with_message(message).into()),
            }
        })
    }
}

fn to_js_value(value: &HostValue) -> JsValue {
    match value {
        HostValue::Undefined => JsValue::undefined(),
        HostValue::Null => JsValue::null(),
        HostValue::Bool(value) => JsValue::from(*value),
        HostValue::Number(value) => JsValue::from(*value),
        HostValue::String(value) => JsValue::from(JsString::from(value.as_str())),
        HostValue::Object(_) => JsValue::from(JsString::from(value.to_display_string())),
    }
}

fn from_js_value(value: &JsValue, context: &mut Context) -> HostValue {
    if value.is_undefined() {
        return HostValue::Undefined;
    }
    if value.is_null() {
        return HostValue::Null;
    }
    if let Some(flag) = value.as_boolean() {
        return HostValue::Bool(flag);
    }
    if let Some(number) = value.as_number() {
        return HostValue::Number(number);
    }
    if let Some(object) = value.as_object() {
        return HostValue::Object(object_kind(object));
    }
    match value.to_string(context) {
        Ok(text) => HostValue::String(text.to_std_string_escaped()),
        Err(_) => HostValue::String(value.display().to_string()),
    }
}

fn object_kind(object: &JsObject) -> ObjectKind {
    if object.is_callable() {
        ObjectKind::Function
    } else if object.is_array() {
        ObjectKind::Array
    } else {
        ObjectKind::Plain
    }
}
