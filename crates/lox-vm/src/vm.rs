// SPDX-License-Identifier: MIT

//! The decode-execute dispatch loop, the call protocol, and the VM's
//! `GcRoots` implementation. See `SPEC_FULL.md` §4.6-§4.9.

use crate::error::{format_report, RuntimeError, TraceLine};
use crate::frame::{CallFrame, FRAMES_MAX, STACK_MAX};
use crate::native::clock;
use crate::upvalues::UpvalueManager;
use lox_core::{collect, Closure, GcRoots, Heap, NativeFn, ObjRef, OpCode, Table, UpvalueState, Value};

/// A failed `interpret`: the structured error plus the formatted report a
/// driver would print to stderr (message + backtrace, `SPEC_FULL.md` §4.9).
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeFailure {
    pub error: RuntimeError,
    pub report: String,
}

pub type InterpretResult = Result<Value, RuntimeFailure>;

/// A transient view over the VM's live state, handed to the collector.
/// Borrows every root-bearing field except the heap itself, so `collect`
/// can hold `&mut Heap` and `&VmRoots` at once.
struct VmRoots<'a> {
    stack: &'a [Value],
    frames: &'a [CallFrame],
    upvalues: &'a UpvalueManager,
    globals: &'a Table,
    init_string: ObjRef,
}

impl GcRoots for VmRoots<'_> {
    fn for_each_root(&self, visit: &mut dyn FnMut(Value)) {
        for &v in self.stack {
            visit(v);
        }
        for frame in self.frames {
            visit(Value::Obj(frame.closure));
        }
        for upvalue in self.upvalues.iter() {
            visit(Value::Obj(upvalue));
        }
        for (key, value) in self.globals.iter() {
            visit(Value::Obj(key));
            visit(value);
        }
        visit(Value::Obj(self.init_string));
    }
}

/// The mutator: value stack, frame stack, open-upvalue list, globals, and
/// the heap they're all rooted in. Strictly single-threaded and
/// non-reentrant (`spec.md` §5) — nothing here is `Send`/`Sync`.
pub struct Vm {
    heap: Heap,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    upvalues: UpvalueManager,
    globals: Table,
    init_string: ObjRef,
    trace: bool,
    gc_stress: bool,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(false, false)
    }

    /// `trace` logs every dispatched instruction at `tracing::trace!`;
    /// `gc_stress` collects before every instruction instead of waiting
    /// for `Heap::should_collect`. Both back the CLI's `--trace`/
    /// `--gc-stress` flags (`SPEC_FULL.md` §3.3).
    #[must_use]
    pub fn with_config(trace: bool, gc_stress: bool) -> Self {
        let mut heap = Heap::new();
        let init_string = heap.intern("init");
        let mut vm = Vm {
            heap,
            stack: Vec::with_capacity(STACK_MAX),
            frames: Vec::with_capacity(FRAMES_MAX),
            upvalues: UpvalueManager::new(),
            globals: Table::new(),
            init_string,
            trace,
            gc_stress,
        };
        vm.define_native("clock", 0, clock);
        vm
    }

    #[must_use]
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    #[cfg(test)]
    #[must_use]
    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    fn define_native(&mut self, name: &str, arity: u8, function: lox_core::NativeFnPtr) {
        let name_ref = self.heap.intern(name);
        let native = self.heap.alloc_native(NativeFn { name: name_ref, arity, function });
        let hash = self.heap.string_hash(name_ref);
        self.globals.set(name_ref, hash, Value::Obj(native));
    }

    /// Run a compiled top-level function to completion. Wraps it in a
    /// closure, pushes it onto the value stack, creates the initial call
    /// frame, and enters the dispatch loop (`spec.md` §2).
    pub fn interpret(&mut self, script: ObjRef) -> InterpretResult {
        let closure = self.heap.alloc_closure(Closure { function: script, upvalues: Vec::new() });
        self.stack.push(Value::Obj(closure));
        self.frames.push(CallFrame::new(closure, 0));

        self.run().map_err(|error| {
            let report = format_report(&error, &self.backtrace());
            self.stack.clear();
            self.frames.clear();
            RuntimeFailure { error, report }
        })
    }

    fn backtrace(&self) -> Vec<TraceLine> {
        self.frames
            .iter()
            .rev()
            .map(|frame| {
                let function = self.heap.closure(frame.closure).function;
                let func = self.heap.function(function);
                let line = func.chunk.get_line(frame.ip.saturating_sub(1));
                let function_name = func
                    .name
                    .map(|n| self.heap.string_bytes(n).to_string())
                    .unwrap_or_else(|| "script".to_string());
                TraceLine { line, function_name }
            })
            .collect()
    }

    fn collect_garbage(&mut self) {
        let roots = VmRoots {
            stack: &self.stack,
            frames: &self.frames,
            upvalues: &self.upvalues,
            globals: &self.globals,
            init_string: self.init_string,
        };
        let stats = collect(&mut self.heap, &roots);
        tracing::debug!(?stats, "vm: collected garbage");
    }

    fn frame(&self) -> &CallFrame {
        self.frames.last().expect("run always has an active frame")
    }

    fn frame_mut(&mut self) -> &mut CallFrame {
        self.frames.last_mut().expect("run always has an active frame")
    }

    fn read_u8(&mut self) -> u8 {
        let ip = self.frame().ip;
        let function = self.heap.closure(self.frame().closure).function;
        let byte = self.heap.function(function).chunk.code[ip];
        self.frame_mut().ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let hi = self.read_u8();
        let lo = self.read_u8();
        u16::from_be_bytes([hi, lo])
    }

    fn read_u24(&mut self) -> usize {
        let b0 = self.read_u8();
        let b1 = self.read_u8();
        let b2 = self.read_u8();
        u32::from_le_bytes([b0, b1, b2, 0]) as usize
    }

    fn read_constant(&self, index: usize) -> Value {
        let function = self.heap.closure(self.frame().closure).function;
        self.heap.function(function).chunk.constants[index]
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_MAX {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("dispatch loop never pops an empty stack")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    fn read_upvalue(&self, upvalue: ObjRef) -> Value {
        match self.heap.upvalue(upvalue).state {
            UpvalueState::Open(slot) => self.stack[slot],
            UpvalueState::Closed(value) => value,
        }
    }

    fn write_upvalue(&mut self, upvalue: ObjRef, value: Value) {
        match self.heap.upvalue(upvalue).state {
            UpvalueState::Open(slot) => self.stack[slot] = value,
            UpvalueState::Closed(_) => {
                self.heap.upvalue_mut(upvalue).state = UpvalueState::Closed(value);
            }
        }
    }

    /// The dispatch loop. Keeps fetching, decoding, and executing until a
    /// `RETURN` unwinds the last frame or an instruction raises an error.
    fn run(&mut self) -> Result<Value, RuntimeError> {
        loop {
            if self.gc_stress || self.heap.should_collect() {
                self.collect_garbage();
            }

            let byte = self.read_u8();
            let op = OpCode::from_u8(byte).expect("compiler emits only defined opcodes");

            if self.trace {
                tracing::trace!(?op, ip = self.frame().ip - 1, "dispatch");
            }

            match op {
                OpCode::Constant => {
                    let index = self.read_u8() as usize;
                    let value = self.read_constant(index);
                    self.push(value)?;
                }
                OpCode::ConstantLong => {
                    let index = self.read_u24();
                    let value = self.read_constant(index);
                    self.push(value)?;
                }
                OpCode::Nil => self.push(Value::Nil)?,
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_u8() as usize;
                    let base = self.frame().base;
                    self.push(self.stack[base + slot])?;
                }
                OpCode::SetLocal => {
                    let slot = self.read_u8() as usize;
                    let base = self.frame().base;
                    self.stack[base + slot] = self.peek(0);
                }
                OpCode::GetGlobal => {
                    let index = self.read_u8() as usize;
                    let name = self.global_name(index);
                    let hash = self.heap.string_hash(name);
                    match self.globals.get(name, hash) {
                        Some(value) => self.push(value)?,
                        None => return Err(self.undefined_global(name)),
                    }
                }
                OpCode::SetGlobal => {
                    let index = self.read_u8() as usize;
                    let name = self.global_name(index);
                    let hash = self.heap.string_hash(name);
                    let value = self.peek(0);
                    if self.globals.set(name, hash, value) {
                        self.globals.delete(name, hash);
                        return Err(self.undefined_global(name));
                    }
                }
                OpCode::DefineGlobal => {
                    let index = self.read_u8() as usize;
                    let name = self.global_name(index);
                    let hash = self.heap.string_hash(name);
                    let value = self.pop();
                    self.globals.set(name, hash, value);
                }
                OpCode::GetUpvalue => {
                    let slot = self.read_u8() as usize;
                    let closure = self.frame().closure;
                    let upvalue = self.heap.closure(closure).upvalues[slot];
                    self.push(self.read_upvalue(upvalue))?;
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_u8() as usize;
                    let closure = self.frame().closure;
                    let upvalue = self.heap.closure(closure).upvalues[slot];
                    let value = self.peek(0);
                    self.write_upvalue(upvalue, value);
                }
                OpCode::GetProperty => {
                    let index = self.read_u8() as usize;
                    let name = self.property_name(index);
                    self.get_property_const(name)?;
                }
                OpCode::SetProperty => {
                    let index = self.read_u8() as usize;
                    let name = self.property_name(index);
                    self.set_property_const(name)?;
                }
                OpCode::GetPropertyVar => self.get_property_var()?,
                OpCode::SetPropertyVar => self.set_property_var()?,
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b))?;
                }
                OpCode::Greater => self.binary_cmp(|a, b| a > b)?,
                OpCode::Less => self.binary_cmp(|a, b| a < b)?,
                OpCode::Add => self.add()?,
                OpCode::Subtract => self.binary_num(|a, b| a - b)?,
                OpCode::Multiply => self.binary_num(|a, b| a * b)?,
                OpCode::Divide => self.binary_num(|a, b| a / b)?,
                OpCode::Modulo => self.modulo()?,
                OpCode::Negate => {
                    let value = self.pop();
                    match value.as_number() {
                        Some(n) => self.push(Value::Number(-n))?,
                        None => return Err(RuntimeError::OperandMustBeNumber),
                    }
                }
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(!value.is_truthy()))?;
                }
                OpCode::Print => {
                    let value = self.pop();
                    println!("{}", self.stringify(value));
                }
                OpCode::Jump => {
                    let offset = self.read_u16();
                    self.frame_mut().ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16();
                    if !self.peek(0).is_truthy() {
                        self.frame_mut().ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16();
                    self.frame_mut().ip -= offset as usize;
                }
                OpCode::Call => {
                    let arg_count = self.read_u8();
                    let callee = self.peek(arg_count as usize);
                    self.call_value(callee, arg_count)?;
                }
                OpCode::Return => {
                    let result = self.pop();
                    let base = self.frame().base;
                    self.upvalues.close_upvalues(&mut self.heap, &self.stack, base);
                    self.frames.pop();
                    self.stack.truncate(base);
                    if self.frames.is_empty() {
                        return Ok(result);
                    }
                    self.push(result)?;
                }
                OpCode::Class => {
                    let index = self.read_u8() as usize;
                    let name = self.read_constant(index).as_obj().expect("class name is a string");
                    let class = self.heap.alloc_class(name);
                    self.push(Value::Obj(class))?;
                }
                OpCode::Method => {
                    let index = self.read_u8() as usize;
                    let name = self.property_name(index);
                    let method = self.pop();
                    let class =
                        self.peek(0).as_obj().expect("OP_METHOD requires a class beneath the closure");
                    let hash = self.heap.string_hash(name);
                    self.heap.class_mut(class).methods.set(name, hash, method);
                }
                OpCode::Inherit => {
                    let superclass_value = self.peek(1);
                    let superclass = superclass_value
                        .as_obj()
                        .filter(|r| self.heap.type_name(*r) == "class")
                        .ok_or(RuntimeError::SuperclassMustBeAClass)?;
                    let subclass =
                        self.peek(0).as_obj().expect("OP_INHERIT requires a class on top");
                    let methods = self.heap.class(superclass).methods.clone();
                    methods.add_all(&mut self.heap.class_mut(subclass).methods);
                    self.pop();
                }
                OpCode::GetSuper => {
                    let index = self.read_u8() as usize;
                    let name = self.property_name(index);
                    let superclass = self.pop().as_obj().expect("GET_SUPER requires a class");
                    let hash = self.heap.string_hash(name);
                    let method = self
                        .heap
                        .class(superclass)
                        .methods
                        .get(name, hash)
                        .ok_or_else(|| self.undefined_property(name))?;
                    let method_ref = method.as_obj().expect("method table stores closures");
                    let instance_value = self.pop();
                    let bound = self.heap.alloc_bound_method(instance_value, method_ref);
                    self.push(Value::Obj(bound))?;
                }
                OpCode::Closure => {
                    let index = self.read_u8() as usize;
                    let function_ref = self
                        .read_constant(index)
                        .as_obj()
                        .expect("closure operand is a function constant");
                    let upvalue_count = self.heap.function(function_ref).upvalue_count;
                    let base = self.frame().base;
                    let enclosing_closure = self.frame().closure;
                    let mut upvalues = Vec::with_capacity(upvalue_count);
                    for _ in 0..upvalue_count {
                        let is_local = self.read_u8() != 0;
                        let idx = self.read_u8() as usize;
                        let upvalue = if is_local {
                            self.upvalues.capture_upvalue(&mut self.heap, base + idx)
                        } else {
                            self.heap.closure(enclosing_closure).upvalues[idx]
                        };
                        upvalues.push(upvalue);
                    }
                    let closure = self.heap.alloc_closure(Closure { function: function_ref, upvalues });
                    self.push(Value::Obj(closure))?;
                }
                OpCode::CloseUpvalue => {
                    let threshold = self.stack.len() - 1;
                    self.upvalues.close_upvalues(&mut self.heap, &self.stack, threshold);
                    self.pop();
                }
            }
        }
    }

    fn global_name(&self, constant_index: usize) -> ObjRef {
        self.read_constant(constant_index).as_obj().expect("global name is a string constant")
    }

    fn property_name(&self, constant_index: usize) -> ObjRef {
        self.read_constant(constant_index).as_obj().expect("property name is a string constant")
    }

    fn undefined_global(&self, name: ObjRef) -> RuntimeError {
        RuntimeError::UndefinedGlobal(self.heap.string_bytes(name).to_string())
    }

    fn undefined_property(&self, name: ObjRef) -> RuntimeError {
        RuntimeError::UndefinedProperty(self.heap.string_bytes(name).to_string())
    }

    fn binary_num(&mut self, op: impl Fn(f64, f64) -> f64) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => {
                self.push(Value::Number(op(a, b)))?;
                Ok(())
            }
            _ => Err(RuntimeError::OperandsMustBeNumbers),
        }
    }

    fn binary_cmp(&mut self, op: impl Fn(f64, f64) -> bool) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => {
                self.push(Value::Bool(op(a, b)))?;
                Ok(())
            }
            _ => Err(RuntimeError::OperandsMustBeNumbers),
        }
    }

    fn modulo(&mut self) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        match (a.as_number(), b.as_number()) {
            (Some(a), Some(b)) => {
                #[allow(clippy::cast_possible_truncation)]
                let result = (a as i64) % (b as i64);
                self.push(Value::Number(result as f64))?;
                Ok(())
            }
            _ => Err(RuntimeError::OperandsMustBeNumbers),
        }
    }

    fn add(&mut self) -> Result<(), RuntimeError> {
        let b = self.pop();
        let a = self.pop();
        if let (Some(x), Some(y)) = (a.as_number(), b.as_number()) {
            self.push(Value::Number(x + y))?;
            return Ok(());
        }
        if let (Some(ar), Some(br)) = (a.as_obj(), b.as_obj()) {
            if self.heap.type_name(ar) == "string" && self.heap.type_name(br) == "string" {
                let concatenated = format!("{}{}", self.heap.string_bytes(ar), self.heap.string_bytes(br));
                let interned = self.heap.intern(&concatenated);
                self.push(Value::Obj(interned))?;
                return Ok(());
            }
        }
        Err(RuntimeError::OperandsMustBeNumbersOrStrings)
    }

    fn get_property_const(&mut self, name: ObjRef) -> Result<(), RuntimeError> {
        let receiver = self.peek(0);
        let instance_ref = receiver
            .as_obj()
            .filter(|r| self.heap.type_name(*r) == "instance")
            .ok_or(RuntimeError::OnlyInstancesHaveProperties)?;
        let hash = self.heap.string_hash(name);
        if let Some(value) = self.heap.instance(instance_ref).fields.get(name, hash) {
            self.pop();
            self.push(value)?;
            return Ok(());
        }
        let class = self.heap.instance(instance_ref).class;
        if let Some(method) = self.heap.class(class).methods.get(name, hash) {
            let method_ref = method.as_obj().expect("method table stores closures");
            let bound = self.heap.alloc_bound_method(Value::Obj(instance_ref), method_ref);
            self.pop();
            self.push(Value::Obj(bound))?;
            return Ok(());
        }
        Err(self.undefined_property(name))
    }

    fn set_property_const(&mut self, name: ObjRef) -> Result<(), RuntimeError> {
        let value = self.peek(0);
        let receiver = self.peek(1);
        let instance_ref = receiver
            .as_obj()
            .filter(|r| self.heap.type_name(*r) == "instance")
            .ok_or(RuntimeError::OnlyInstancesHaveProperties)?;
        let hash = self.heap.string_hash(name);
        self.heap.instance_mut(instance_ref).fields.set(name, hash, value);
        self.pop();
        self.pop();
        self.push(value)?;
        Ok(())
    }

    fn property_var_name(&mut self) -> Result<ObjRef, RuntimeError> {
        let name = self
            .pop()
            .as_obj()
            .filter(|r| self.heap.type_name(*r) == "string")
            .ok_or(RuntimeError::PropertyNameMustBeString)?;
        Ok(name)
    }

    fn get_property_var(&mut self) -> Result<(), RuntimeError> {
        let name = self.property_var_name()?;
        let receiver = self.peek(0);
        let instance_ref = receiver
            .as_obj()
            .filter(|r| self.heap.type_name(*r) == "instance")
            .ok_or(RuntimeError::OnlyInstancesHaveProperties)?;
        let hash = self.heap.string_hash(name);
        match self.heap.instance(instance_ref).fields.get(name, hash) {
            Some(value) => {
                self.pop();
                self.push(value)?;
                Ok(())
            }
            None => Err(self.undefined_property(name)),
        }
    }

    fn set_property_var(&mut self) -> Result<(), RuntimeError> {
        let value = self.pop();
        let name = self.property_var_name()?;
        let receiver = self.peek(0);
        let instance_ref = receiver
            .as_obj()
            .filter(|r| self.heap.type_name(*r) == "instance")
            .ok_or(RuntimeError::OnlyInstancesHaveProperties)?;
        let hash = self.heap.string_hash(name);
        self.heap.instance_mut(instance_ref).fields.set(name, hash, value);
        self.pop();
        self.push(value)?;
        Ok(())
    }

    /// Dispatch a `CALL` by the callee's runtime type (`spec.md` §4.8).
    fn call_value(&mut self, callee: Value, arg_count: u8) -> Result<(), RuntimeError> {
        let obj = callee.as_obj().ok_or(RuntimeError::NotCallable)?;
        match self.heap.type_name(obj) {
            "closure" => self.call_closure(obj, arg_count),
            "class" => self.call_class(obj, arg_count),
            "bound method" => self.call_bound_method(obj, arg_count),
            "native function" => self.call_native(obj, arg_count),
            _ => Err(RuntimeError::NotCallable),
        }
    }

    fn call_closure(&mut self, closure: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let function = self.heap.closure(closure).function;
        let arity = self.heap.function(function).arity;
        if arg_count != arity {
            return Err(RuntimeError::ArityMismatch { expected: arity, got: arg_count });
        }
        if self.frames.len() >= FRAMES_MAX {
            return Err(RuntimeError::StackOverflow);
        }
        let base = self.stack.len() - arg_count as usize - 1;
        self.frames.push(CallFrame::new(closure, base));
        Ok(())
    }

    fn call_class(&mut self, class: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let base = self.stack.len() - arg_count as usize - 1;
        let instance = self.heap.alloc_instance(class);
        self.stack[base] = Value::Obj(instance);

        let hash = self.heap.string_hash(self.init_string);
        if let Some(init) = self.heap.class(class).methods.get(self.init_string, hash) {
            let init_closure = init.as_obj().expect("init is stored as a closure");
            return self.call_closure(init_closure, arg_count);
        }
        if arg_count != 0 {
            return Err(RuntimeError::ArityMismatch { expected: 0, got: arg_count });
        }
        Ok(())
    }

    fn call_bound_method(&mut self, bound: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let base = self.stack.len() - arg_count as usize - 1;
        let bound_method = self.heap.bound_method(bound);
        let (receiver, method) = (bound_method.receiver, bound_method.method);
        self.stack[base] = receiver;
        self.call_closure(method, arg_count)
    }

    fn call_native(&mut self, native: ObjRef, arg_count: u8) -> Result<(), RuntimeError> {
        let info = self.heap.native(native);
        let (arity, function, name) = (info.arity, info.function, info.name);
        if arg_count != arity {
            return Err(RuntimeError::ArityMismatch { expected: arity, got: arg_count });
        }
        let base = self.stack.len() - arg_count as usize - 1;
        let args: Vec<Value> = self.stack[base + 1..].to_vec();
        let result = function(&args).map_err(|message| RuntimeError::Native {
            name: self.heap.string_bytes(name).to_string(),
            message,
        })?;
        self.stack.truncate(base);
        self.push(result)?;
        Ok(())
    }

    /// Render a value the way `PRINT` does.
    fn stringify(&self, value: Value) -> String {
        match value {
            Value::Nil => "nil".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Obj(r) => match self.heap.type_name(r) {
                "string" => self.heap.string_bytes(r).to_string(),
                "function" => match self.heap.function(r).name {
                    Some(name) => format!("<fn {}>", self.heap.string_bytes(name)),
                    None => "<script>".to_string(),
                },
                "native function" => {
                    format!("<native fn {}>", self.heap.string_bytes(self.heap.native(r).name))
                }
                "closure" => self.stringify(Value::Obj(self.heap.closure(r).function)),
                "class" => self.heap.string_bytes(self.heap.class(r).name).to_string(),
                "instance" => {
                    let class = self.heap.instance(r).class;
                    format!("{} instance", self.heap.string_bytes(self.heap.class(class).name))
                }
                "bound method" => self.stringify(Value::Obj(self.heap.bound_method(r).method)),
                _ => "<object>".to_string(),
            },
        }
    }
}


#[cfg(test)]
mod vm_proptest {
    use super::*;
    use proptest::prelude::*;

    fn compile_and_run(vm: &mut Vm, source: &str) -> InterpretResult {
        let script = lox_compiler::compile(source, vm.heap_mut()).expect("source compiles");
        vm.interpret(script)
    }

    proptest! {
        /// `spec.md` §8 invariant 1: on successful termination the value
        /// stack is back to empty, for any sequence of arithmetic
        /// expression statements (each one pushes and then pops via `POP`).
        #[test]
        fn stack_is_empty_after_successful_run(
            terms in prop::collection::vec(-1000i32..1000, 1..20),
        ) {
            let mut vm = Vm::new();
            let source: String = terms.iter().map(|n| format!("{n};\n")).collect();
            let result = compile_and_run(&mut vm, &source);
            prop_assert!(result.is_ok());
            prop_assert_eq!(vm.stack_len(), 0);
        }
    }

    #[test]
    fn recursion_at_the_frame_limit_succeeds() {
        let mut vm = Vm::new();
        let source = format!(
            "fun rec(n) {{ if (n == 0) return 0; return 1 + rec(n - 1); }} print rec({});",
            crate::frame::FRAMES_MAX - 2
        );
        let result = compile_and_run(&mut vm, &source);
        assert!(result.is_ok());
    }

    #[test]
    fn recursion_past_the_frame_limit_is_a_runtime_error_not_a_panic() {
        let mut vm = Vm::new();
        let source = format!(
            "fun rec(n) {{ if (n == 0) return 0; return 1 + rec(n - 1); }} print rec({});",
            crate::frame::FRAMES_MAX + 50
        );
        let err = compile_and_run(&mut vm, &source).unwrap_err();
        assert_eq!(err.error, RuntimeError::StackOverflow);
    }

    #[test]
    fn setting_a_property_on_a_non_instance_is_a_runtime_error_not_a_panic() {
        let mut vm = Vm::new();
        let err = compile_and_run(&mut vm, "var s = \"x\"; s.y = 1;").unwrap_err();
        assert_eq!(err.error, RuntimeError::OnlyInstancesHaveProperties);
    }

    #[test]
    fn subscript_get_on_a_non_instance_is_a_runtime_error_not_a_panic() {
        let mut vm = Vm::new();
        let err = compile_and_run(&mut vm, "var s = \"x\"; print s[\"y\"];").unwrap_err();
        assert_eq!(err.error, RuntimeError::OnlyInstancesHaveProperties);
    }

    #[test]
    fn subscript_set_on_a_non_instance_is_a_runtime_error_not_a_panic() {
        let mut vm = Vm::new();
        let err = compile_and_run(&mut vm, "var s = \"x\"; s[\"y\"] = 1;").unwrap_err();
        assert_eq!(err.error, RuntimeError::OnlyInstancesHaveProperties);
    }

    #[test]
    fn non_string_subscript_name_is_a_runtime_error_not_a_panic() {
        let mut vm = Vm::new();
        let err =
            compile_and_run(&mut vm, "class A {} var a = A(); print a[123];").unwrap_err();
        assert_eq!(err.error, RuntimeError::PropertyNameMustBeString);
    }

    #[test]
    fn same_deterministic_program_yields_identical_stack_depth_twice() {
        // `spec.md` §8 invariant 6 (determinism) in miniature: a program
        // with no native calls behaves identically across two fresh VMs.
        let source = "var a = 1; for (var i = 0; i < 5; i = i + 1) { a = a * 2; } print a;";
        let mut vm1 = Vm::new();
        let mut vm2 = Vm::new();
        let r1 = compile_and_run(&mut vm1, source);
        let r2 = compile_and_run(&mut vm2, source);
        assert!(r1.is_ok());
        assert!(r2.is_ok());
        assert_eq!(vm1.stack_len(), vm2.stack_len());
    }
}
