//! Call-stack frames.
//!
//! A [`Frame`] exposes the same member names a runtime frame does
//! (`f_code`, `f_lineno`, `f_locals`, `f_globals`, `f_back`), so that once
//! captured it reconstructs into a proxy a frame-oriented consumer can walk.

use std::any::Any;
use std::borrow::Cow;
use std::sync::Arc;

use super::{Dict, ObjRef, Object};

/// Code object: the static part of a frame.
pub struct Code
{
    name: String,
    filename: String,
    firstlineno: i64,
    // member objects are created once so their ids stay stable
    name_obj: ObjRef,
    filename_obj: ObjRef,
    firstlineno_obj: ObjRef,
}

impl Code
{
    pub fn new(name: impl Into<String>, filename: impl Into<String>, firstlineno: i64) -> Arc<Self>
    {
        let name = name.into();
        let filename = filename.into();
        Arc::new(Self {
            name_obj: super::string(name.clone()),
            filename_obj: super::string(filename.clone()),
            firstlineno_obj: super::int(firstlineno),
            name,
            filename,
            firstlineno,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str
    {
        &self.name
    }

    #[must_use]
    pub fn filename(&self) -> &str
    {
        &self.filename
    }

    #[must_use]
    pub fn firstlineno(&self) -> i64
    {
        self.firstlineno
    }
}

impl Object for Code
{
    fn type_name(&self) -> Cow<'_, str>
    {
        Cow::Borrowed("code")
    }

    fn members(&self) -> Vec<(String, ObjRef)>
    {
        vec![
            ("co_name".to_string(), self.name_obj.clone()),
            ("co_filename".to_string(), self.filename_obj.clone()),
            ("co_firstlineno".to_string(), self.firstlineno_obj.clone()),
        ]
    }

    fn as_any(&self) -> &dyn Any
    {
        self
    }
}

/// One activation record on a call stack.
///
/// ## Example
///
/// ```rust
/// use postmortem_core::object::{self, Code, Dict, Frame};
///
/// let globals = Dict::new(Vec::new());
/// let outer = Frame::new(Code::new("<module>", "app.py", 1), 12, Dict::new(Vec::new()), globals.clone(), None);
/// let locals = Dict::new(vec![(object::string("x"), object::int(142_857))]);
/// let inner = Frame::new(Code::new("compute", "app.py", 3), 5, locals, globals, Some(outer));
///
/// let names: Vec<_> = inner.chain().iter().map(|f| f.code().name().to_string()).collect();
/// assert_eq!(names, ["compute", "<module>"]);
/// ```
pub struct Frame
{
    code: Arc<Code>,
    lineno: i64,
    locals: Arc<Dict>,
    globals: Arc<Dict>,
    back: Option<Arc<Frame>>,
    lineno_obj: ObjRef,
    back_obj: ObjRef,
}

impl Frame
{
    #[must_use]
    pub fn new(
        code: Arc<Code>,
        lineno: i64,
        locals: Arc<Dict>,
        globals: Arc<Dict>,
        back: Option<Arc<Frame>>,
    ) -> Arc<Self>
    {
        let back_obj = match &back {
            Some(frame) => frame.clone() as ObjRef,
            None => super::none(),
        };
        Arc::new(Self {
            code,
            lineno,
            locals,
            globals,
            back,
            lineno_obj: super::int(lineno),
            back_obj,
        })
    }

    #[must_use]
    pub fn code(&self) -> &Arc<Code>
    {
        &self.code
    }

    #[must_use]
    pub fn lineno(&self) -> i64
    {
        self.lineno
    }

    #[must_use]
    pub fn locals(&self) -> &Arc<Dict>
    {
        &self.locals
    }

    #[must_use]
    pub fn globals(&self) -> &Arc<Dict>
    {
        &self.globals
    }

    #[must_use]
    pub fn back(&self) -> Option<&Arc<Frame>>
    {
        self.back.as_ref()
    }

    /// This frame followed by every caller, innermost first.
    #[must_use]
    pub fn chain(self: &Arc<Self>) -> Vec<Arc<Frame>>
    {
        let mut frames = vec![self.clone()];
        let mut current = self.back.clone();
        while let Some(frame) = current {
            current = frame.back.clone();
            frames.push(frame);
        }
        frames
    }
}

impl Object for Frame
{
    fn type_name(&self) -> Cow<'_, str>
    {
        Cow::Borrowed("frame")
    }

    fn members(&self) -> Vec<(String, ObjRef)>
    {
        vec![
            ("f_back".to_string(), self.back_obj.clone()),
            ("f_code".to_string(), self.code.clone() as ObjRef),
            ("f_globals".to_string(), self.globals.clone() as ObjRef),
            ("f_lineno".to_string(), self.lineno_obj.clone()),
            ("f_locals".to_string(), self.locals.clone() as ObjRef),
        ]
    }

    fn as_any(&self) -> &dyn Any
    {
        self
    }
}
