//! Task lists submitted to the worker pool.
//!
//! A task is a self-contained program against one worker's arena: every
//! buffer it touches is allocated by the task itself and referred to by
//! position, so a task can run on any worker.

/// A call argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Param {
    /// The arena offset of a buffer allocated earlier in the task.
    Var(usize),
    /// A literal integer.
    Val(u32),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Step {
    Alloc { var: usize, len: usize },
    Set { var: usize, data: Vec<u8> },
    AllocSet { var: usize, data: Vec<u8> },
    Call { func: String, params: Vec<Param> },
    Get { var: usize, len: usize },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Task {
    steps: Vec<Step>,
    vars: usize,
}

impl Task {
    pub fn new() -> Task {
        Task::default()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Number of buffers the task allocates.
    pub fn num_vars(&self) -> usize {
        self.vars
    }

    /// Number of buffers the task returns.
    pub fn num_outputs(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, Step::Get { .. }))
            .count()
    }

    fn next_var(&mut self) -> usize {
        let var = self.vars;
        self.vars += 1;
        var
    }

    pub fn alloc(&mut self, len: usize) -> Param {
        let var = self.next_var();
        self.steps.push(Step::Alloc { var, len });
        Param::Var(var)
    }

    pub fn alloc_set(&mut self, data: Vec<u8>) -> Param {
        let var = self.next_var();
        self.steps.push(Step::AllocSet { var, data });
        Param::Var(var)
    }

    /// Overwrites a buffer allocated earlier in the task.
    pub fn set(&mut self, var: Param, data: Vec<u8>) -> &mut Task {
        self.steps.push(Step::Set {
            var: index(var),
            data,
        });
        self
    }

    pub fn call(&mut self, func: impl Into<String>, params: &[Param]) -> &mut Task {
        self.steps.push(Step::Call {
            func: func.into(),
            params: params.to_vec(),
        });
        self
    }

    pub fn get(&mut self, var: Param, len: usize) -> &mut Task {
        self.steps.push(Step::Get {
            var: index(var),
            len,
        });
        self
    }
}

// A literal never names a buffer; the executor rejects the sentinel.
fn index(p: Param) -> usize {
    match p {
        Param::Var(var) => var,
        Param::Val(_) => usize::MAX,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vars_are_positional() {
        let mut task = Task::new();
        let a = task.alloc_set(vec![1, 2, 3]);
        let b = task.alloc(3);
        task.call("frm_copy", &[a, b]).get(b, 3);

        assert_eq!(a, Param::Var(0));
        assert_eq!(b, Param::Var(1));
        assert_eq!(task.num_vars(), 2);
        assert_eq!(task.num_outputs(), 1);
        assert_eq!(
            task.steps()[2],
            Step::Call {
                func: "frm_copy".into(),
                params: vec![Param::Var(0), Param::Var(1)],
            }
        );
    }
}
