use std::fmt;
use std::sync::{Arc, LazyLock, OnceLock};

use crate::grammars::{PatternSet, ROOT_RULE_ID, RuleId};
use crate::tokenizer::scopes::AttributedScopeStack;

static INITIAL: LazyLock<StateStack> = LazyLock::new(|| StateStack {
    frame: Arc::new(StackFrame {
        parent: None,
        depth: 1,
        rule_id: ROOT_RULE_ID,
        enter_position: None,
        anchor_position: None,
        begin_rule_has_captured_eol: false,
        end_rule: None,
        end_patterns: OnceLock::new(),
        name_scopes: None,
        content_scopes: None,
    }),
});

struct StackFrame {
    parent: Option<StateStack>,
    /// 1 for the root frame
    depth: usize,
    /// Rule that created this stack element
    rule_id: RuleId,
    /// The position where this rule was entered during the current line, for endless loop
    /// detection. None at the beginning of a line
    enter_position: Option<usize>,
    /// Where `\G` matches while this frame is on top. None at the beginning of a line
    anchor_position: Option<usize>,
    /// The begin match included the `\n`: the next line starts with an anchor at 0
    begin_rule_has_captured_eol: bool,
    /// End or while pattern with its back references resolved
    end_rule: Option<String>,
    /// The patterns scanned for `end_rule`, built the first time the frame is scanned
    end_patterns: OnceLock<Arc<PatternSet>>,
    /// "name" scopes, applied to begin/end delimiters
    name_scopes: Option<Arc<AttributedScopeStack>>,
    /// "contentName" scopes, applied to the content between delimiters
    content_scopes: Option<Arc<AttributedScopeStack>>,
}

fn same_scopes(
    a: Option<&Arc<AttributedScopeStack>>,
    b: Option<&Arc<AttributedScopeStack>>,
) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// The tokenizer state at the end of a line: the stack of the rules still open.
///
/// Frames are immutable and shared: pushing or popping creates a new stack pointing to the
/// frames it has in common with the previous one, so cloning is cheap.
#[derive(Clone)]
pub struct StateStack {
    frame: Arc<StackFrame>,
}

impl StateStack {
    /// The state to use for the first line of a document
    pub fn initial() -> Self {
        INITIAL.clone()
    }

    pub fn is_initial(&self) -> bool {
        Arc::ptr_eq(&self.frame, &INITIAL.frame)
    }

    pub(crate) fn root(scopes: Option<Arc<AttributedScopeStack>>) -> Self {
        Self {
            frame: Arc::new(StackFrame {
                parent: None,
                depth: 1,
                rule_id: ROOT_RULE_ID,
                enter_position: None,
                anchor_position: None,
                begin_rule_has_captured_eol: false,
                end_rule: None,
                end_patterns: OnceLock::new(),
                name_scopes: scopes.clone(),
                content_scopes: scopes,
            }),
        }
    }

    pub fn depth(&self) -> usize {
        self.frame.depth
    }

    pub fn rule_id(&self) -> RuleId {
        self.frame.rule_id
    }

    pub fn parent(&self) -> Option<&StateStack> {
        self.frame.parent.as_ref()
    }

    pub fn enter_position(&self) -> Option<usize> {
        self.frame.enter_position
    }

    pub fn anchor_position(&self) -> Option<usize> {
        self.frame.anchor_position
    }

    pub fn begin_rule_has_captured_eol(&self) -> bool {
        self.frame.begin_rule_has_captured_eol
    }

    pub fn end_rule(&self) -> Option<&str> {
        self.frame.end_rule.as_deref()
    }

    pub fn name_scopes(&self) -> Option<&Arc<AttributedScopeStack>> {
        self.frame.name_scopes.as_ref()
    }

    pub fn content_scopes(&self) -> Option<&Arc<AttributedScopeStack>> {
        self.frame.content_scopes.as_ref()
    }

    /// The scope names of the content of the innermost rule, outermost first
    pub fn scope_names(&self) -> Vec<String> {
        self.content_scopes()
            .map(|s| s.scope_names())
            .unwrap_or_default()
    }

    /// Called when entering a nested context
    #[allow(clippy::too_many_arguments)]
    pub fn push(
        &self,
        rule_id: RuleId,
        enter_position: Option<usize>,
        anchor_position: Option<usize>,
        begin_rule_has_captured_eol: bool,
        end_rule: Option<String>,
        name_scopes: Option<Arc<AttributedScopeStack>>,
        content_scopes: Option<Arc<AttributedScopeStack>>,
    ) -> Self {
        Self {
            frame: Arc::new(StackFrame {
                parent: Some(self.clone()),
                depth: self.frame.depth + 1,
                rule_id,
                enter_position,
                anchor_position,
                begin_rule_has_captured_eol,
                end_rule,
                end_patterns: OnceLock::new(),
                name_scopes,
                content_scopes,
            }),
        }
    }

    /// Exits the current context, getting back to the parent.
    /// Returns None for the root frame.
    pub fn pop(&self) -> Option<Self> {
        self.frame.parent.clone()
    }

    /// Pop but never go below the root frame, used when recovering from broken grammars
    pub fn safe_pop(&self) -> Self {
        self.pop().unwrap_or_else(|| self.clone())
    }

    /// Same frame with other content scopes
    pub fn with_content_scopes(&self, content_scopes: Option<Arc<AttributedScopeStack>>) -> Self {
        if same_scopes(self.frame.content_scopes.as_ref(), content_scopes.as_ref()) {
            return self.clone();
        }
        self.replace_top(|frame| frame.content_scopes = content_scopes)
    }

    /// Same frame with a resolved end or while pattern
    pub fn with_end_rule(&self, end_rule: String) -> Self {
        if self.frame.end_rule.as_deref() == Some(end_rule.as_str()) {
            return self.clone();
        }
        self.replace_top(|frame| {
            frame.end_rule = Some(end_rule);
            frame.end_patterns = OnceLock::new();
        })
    }

    /// The pattern set of the resolved end or while pattern, built once per frame
    pub(crate) fn end_patterns(&self, build: impl FnOnce() -> Arc<PatternSet>) -> Arc<PatternSet> {
        Arc::clone(self.frame.end_patterns.get_or_init(build))
    }

    fn replace_top(&self, update: impl FnOnce(&mut StackFrame)) -> Self {
        let f = &self.frame;
        let mut frame = StackFrame {
            parent: f.parent.clone(),
            depth: f.depth,
            rule_id: f.rule_id,
            enter_position: f.enter_position,
            anchor_position: f.anchor_position,
            begin_rule_has_captured_eol: f.begin_rule_has_captured_eol,
            end_rule: f.end_rule.clone(),
            end_patterns: f.end_patterns.clone(),
            name_scopes: f.name_scopes.clone(),
            content_scopes: f.content_scopes.clone(),
        };
        update(&mut frame);
        Self {
            frame: Arc::new(frame),
        }
    }

    /// Whether a frame entered at the same position as the top of `other` has the same rule.
    /// Pushing such a rule again without advancing would loop forever.
    pub fn has_same_rule_as(&self, other: &StateStack) -> bool {
        let mut current = Some(self);
        while let Some(el) = current
            && el.frame.enter_position == other.frame.enter_position
        {
            if el.frame.rule_id == other.frame.rule_id {
                return true;
            }
            current = el.parent();
        }
        false
    }

    /// The same stack with the enter and anchor positions cleared, which only make sense
    /// within the line they were set in.
    pub fn reset(&self) -> Self {
        if self.is_initial() {
            return self.clone();
        }
        // Rebuilt from the root up so deep stacks don't recurse
        let mut parent: Option<StateStack> = None;
        for el in self.frames() {
            let parent_unchanged = match (&parent, &el.frame.parent) {
                (Some(a), Some(b)) => Arc::ptr_eq(&a.frame, &b.frame),
                (None, None) => true,
                _ => false,
            };
            let next = if parent_unchanged
                && el.frame.enter_position.is_none()
                && el.frame.anchor_position.is_none()
            {
                el.clone()
            } else {
                let new_parent = parent.take();
                el.replace_top(|frame| {
                    frame.parent = new_parent;
                    frame.enter_position = None;
                    frame.anchor_position = None;
                })
            };
            parent = Some(next);
        }
        parent.unwrap_or_else(|| self.clone())
    }

    /// Rule ids, end rules and depths of every frame, ignoring positions
    fn structural_equals(a: &StateStack, b: &StateStack) -> bool {
        let (mut a, mut b) = (Some(a), Some(b));
        loop {
            match (a, b) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if Arc::ptr_eq(&x.frame, &y.frame) {
                        return true;
                    }
                    if x.frame.depth != y.frame.depth
                        || x.frame.rule_id != y.frame.rule_id
                        || x.frame.end_rule != y.frame.end_rule
                    {
                        return false;
                    }
                    a = x.parent();
                    b = y.parent();
                }
                _ => return false,
            }
        }
    }

    /// Whether two states would tokenize the next line the same way.
    /// Positions are not compared since they are reset at the start of each line.
    pub fn equals(&self, other: &StateStack) -> bool {
        if Arc::ptr_eq(&self.frame, &other.frame) {
            return true;
        }
        if !Self::structural_equals(self, other) {
            return false;
        }
        AttributedScopeStack::equals(self.content_scopes(), other.content_scopes())
    }

    fn frames(&self) -> Vec<&StateStack> {
        let mut frames = Vec::with_capacity(self.depth());
        let mut current = Some(self);
        while let Some(el) = current {
            frames.push(el);
            current = el.parent();
        }
        frames.reverse();
        frames
    }
}

impl Drop for StackFrame {
    fn drop(&mut self) {
        let mut parent = self.parent.take();
        while let Some(StateStack { frame }) = parent {
            parent = Arc::into_inner(frame).and_then(|mut frame| frame.parent.take());
        }
    }
}

impl PartialEq for StateStack {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other)
    }
}

impl fmt::Debug for StateStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "StateStack:")?;

        for (depth, frame) in self.frames().into_iter().enumerate() {
            let indent = "  ".repeat(depth);
            write!(f, "{indent}rule={}", frame.rule_id())?;

            if let Some(scopes) = frame.name_scopes() {
                write!(f, " name=[{}]", scopes.scope_names().join(", "))?;
            }
            if let Some(scopes) = frame.content_scopes() {
                write!(f, ", content=[{}]", scopes.scope_names().join(", "))?;
            }
            if let Some(pattern) = frame.end_rule() {
                write!(f, ", end_rule=\"{pattern}\"")?;
            }

            write!(f, ", anchor_pos={:?}", frame.anchor_position())?;
            if let Some(enter_pos) = frame.enter_position()
                && frame.anchor_position() != Some(enter_pos)
            {
                write!(f, ", enter_pos={enter_pos}")?;
            }

            write!(
                f,
                ", begin_rule_has_captured_eol={}",
                frame.begin_rule_has_captured_eol()
            )?;
            writeln!(f)?;
        }

        Ok(())
    }
}
