//! Build plans and their step sequence.
//!
//! A plan is a tree rooted at the start target. Dependencies are expanded
//! depth-first the first time they are reached; later reaches become
//! [`BuildTargetDep::Completed`] leaves, so every reachable target is built
//! exactly once and always after its dependencies.
//!
//! [`BuildSteps`] walks the tree with an explicit stack and yields, per target:
//!
//! ```text
//! BeginTarget
//! BeginDependencies
//!   SkipCompletedDependency                 (already built)
//!   BuildDependency, <dependency's steps>   (first reach)
//! EndDependencies
//! BuildTarget
//! EndTarget
//! ```
//!
//! Only [`BuildStep::BuildTarget`] asks for work; the rest is informational.

use std::collections::HashSet;
use std::fmt;

use crate::model::{MakeSpec, ModelError, Target, TargetId};

/// One target of a plan with its dependencies, in declaration order.
#[derive(Debug)]
pub struct BuildTarget<'a> {
  pub target: &'a Target,
  pub deps: Vec<BuildTargetDep<'a>>,
}

#[derive(Debug)]
pub enum BuildTargetDep<'a> {
  /// Reached before; already built by the time this edge is visited.
  Completed(&'a Target),
  /// First reach; expanded here.
  Incomplete(BuildTarget<'a>),
}

impl<'a> BuildTargetDep<'a> {
  pub fn target(&self) -> &'a Target {
    match self {
      BuildTargetDep::Completed(target) => *target,
      BuildTargetDep::Incomplete(build) => build.target,
    }
  }
}

#[derive(Debug)]
pub struct BuildPlan<'a> {
  pub root: BuildTarget<'a>,
}

impl<'a> BuildPlan<'a> {
  pub fn steps(&self) -> BuildSteps<'_, 'a> {
    BuildSteps::new(&self.root)
  }

  /// Targets in the order they will be built.
  pub fn build_order(&self) -> Vec<&'a Target> {
    self
      .steps()
      .filter_map(|step| match step {
        BuildStep::BuildTarget { target } => Some(target),
        _ => None,
      })
      .collect()
  }
}

/// Plan a build rooted at `target_name`, or at the default target.
pub fn create_build_plan<'a>(spec: &'a MakeSpec, target_name: Option<&str>) -> Result<BuildPlan<'a>, ModelError> {
  let start = spec.target_or_default(target_name)?;
  let mut completed = HashSet::new();
  let root = expand(spec, start, &mut completed);
  Ok(BuildPlan { root })
}

fn expand<'a>(spec: &'a MakeSpec, target: &'a Target, completed: &mut HashSet<TargetId>) -> BuildTarget<'a> {
  let deps = target
    .deps
    .iter()
    .map(|id| {
      let dep = spec.target(*id);
      if completed.contains(id) {
        BuildTargetDep::Completed(dep)
      } else {
        BuildTargetDep::Incomplete(expand(spec, dep, completed))
      }
    })
    .collect();
  completed.insert(target.id);
  BuildTarget { target, deps }
}

/// One event of a plan's traversal.
#[derive(Debug, Clone, Copy)]
pub enum BuildStep<'p, 'a> {
  BeginTarget {
    target: &'a Target,
  },
  BeginDependencies {
    target: &'a Target,
    deps: &'p [BuildTargetDep<'a>],
  },
  SkipCompletedDependency {
    target: &'a Target,
    dep: &'a Target,
  },
  BuildDependency {
    target: &'a Target,
    dep: &'a Target,
  },
  EndDependencies {
    target: &'a Target,
    deps: &'p [BuildTargetDep<'a>],
  },
  BuildTarget {
    target: &'a Target,
  },
  EndTarget {
    target: &'a Target,
  },
}

impl<'p, 'a> BuildStep<'p, 'a> {
  /// The target whose traversal produced this step.
  pub fn target(&self) -> &'a Target {
    match *self {
      BuildStep::BeginTarget { target }
      | BuildStep::BeginDependencies { target, .. }
      | BuildStep::SkipCompletedDependency { target, .. }
      | BuildStep::BuildDependency { target, .. }
      | BuildStep::EndDependencies { target, .. }
      | BuildStep::BuildTarget { target }
      | BuildStep::EndTarget { target } => target,
    }
  }
}

impl fmt::Display for BuildStep<'_, '_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = &self.target().name;
    match self {
      BuildStep::BeginTarget { .. } => write!(f, "{} - begin", name),
      BuildStep::BeginDependencies { deps, .. } => write!(f, "{} -   build {} dependencies", name, deps.len()),
      BuildStep::SkipCompletedDependency { dep, .. } => {
        write!(f, "{} -     skipping dependency \"{}\" built previously", name, dep.name)
      }
      BuildStep::BuildDependency { dep, .. } => write!(f, "{} -     build dependency \"{}\"", name, dep.name),
      BuildStep::EndDependencies { deps, .. } => write!(f, "{} -   end {} dependencies", name, deps.len()),
      BuildStep::BuildTarget { .. } => write!(f, "{} -   building", name),
      BuildStep::EndTarget { .. } => write!(f, "{} - end", name),
    }
  }
}

/// Where a frame is in its target's step sequence.
#[derive(Debug, Clone, Copy)]
enum Phase {
  Begin,
  BeginDependencies,
  /// Next dependency to visit; past the end closes the dependency block.
  Dependency(usize),
  Build,
  End,
}

/// Iterator over a plan's steps, one frame per target being walked.
pub struct BuildSteps<'p, 'a> {
  stack: Vec<(&'p BuildTarget<'a>, Phase)>,
}

impl<'p, 'a> BuildSteps<'p, 'a> {
  pub fn new(root: &'p BuildTarget<'a>) -> Self {
    Self {
      stack: vec![(root, Phase::Begin)],
    }
  }
}

impl<'p, 'a> Iterator for BuildSteps<'p, 'a> {
  type Item = BuildStep<'p, 'a>;

  fn next(&mut self) -> Option<Self::Item> {
    let (node, phase) = self.stack.pop()?;
    let target = node.target;

    let step = match phase {
      Phase::Begin => {
        self.stack.push((node, Phase::BeginDependencies));
        BuildStep::BeginTarget { target }
      }
      Phase::BeginDependencies => {
        self.stack.push((node, Phase::Dependency(0)));
        BuildStep::BeginDependencies {
          target,
          deps: &node.deps,
        }
      }
      Phase::Dependency(index) => match node.deps.get(index) {
        None => {
          self.stack.push((node, Phase::Build));
          BuildStep::EndDependencies {
            target,
            deps: &node.deps,
          }
        }
        Some(&BuildTargetDep::Completed(dep)) => {
          self.stack.push((node, Phase::Dependency(index + 1)));
          BuildStep::SkipCompletedDependency { target, dep }
        }
        Some(BuildTargetDep::Incomplete(child)) => {
          self.stack.push((node, Phase::Dependency(index + 1)));
          self.stack.push((child, Phase::Begin));
          BuildStep::BuildDependency {
            target,
            dep: child.target,
          }
        }
      },
      Phase::Build => {
        self.stack.push((node, Phase::End));
        BuildStep::BuildTarget { target }
      }
      Phase::End => BuildStep::EndTarget { target },
    };
    Some(step)
  }
}
