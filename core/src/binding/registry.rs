use super::{BindingIdentifier, ParameterBinding, ParameterOrigin};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

/// Collects bindings while a template is rewritten.
///
/// Occurrences of the same argument that need the same transform share one
/// placeholder; differently transformed occurrences get a synthetic one
/// (`name_1`, `name_2`, ... or the next free position).
#[derive(Debug, Default)]
pub struct BindingRegistry {
    bindings: Vec<ParameterBinding>,
    by_origin: HashMap<ParameterOrigin, SmallVec<[usize; 2]>>,
    names: HashSet<String>,
    next_position: usize,
}

impl BindingRegistry {
    /// `greatest_position` is the highest explicit `?N` in the template; minted
    /// positions start above it.
    pub fn new(greatest_position: usize) -> Self {
        Self {
            next_position: greatest_position,
            ..Self::default()
        }
    }

    /// Registers `binding` and returns the identifier its occurrence must be
    /// rewritten to.
    pub fn register(&mut self, binding: ParameterBinding) -> BindingIdentifier {
        let compatible = self.by_origin.get(binding.origin()).map(|indices| {
            indices
                .iter()
                .map(|&i| &self.bindings[i])
                .find(|existing| existing.is_compatible_with(&binding))
                .map(|existing| existing.identifier().clone())
        });

        match compatible {
            None => self.push(binding),
            Some(Some(identifier)) => {
                tracing::trace!("Reusing {} for {}", identifier, binding.origin());
                identifier
            }
            Some(None) => {
                let identifier = self.mint(binding.identifier());
                tracing::trace!(
                    "Minted {} for differently transformed use of {}",
                    identifier,
                    binding.origin()
                );
                self.push(binding.with_identifier(identifier))
            }
        }
    }

    /// Registers `binding` without attempting to share placeholders.
    pub fn register_unique(&mut self, binding: ParameterBinding) -> BindingIdentifier {
        self.push(binding)
    }

    /// Reserves the next synthetic position.
    pub fn next_position(&mut self) -> usize {
        self.next_position += 1;
        self.next_position
    }

    pub fn bindings(&self) -> &[ParameterBinding] {
        &self.bindings
    }

    pub fn into_bindings(self) -> Vec<ParameterBinding> {
        self.bindings
    }

    fn push(&mut self, binding: ParameterBinding) -> BindingIdentifier {
        let identifier = binding.identifier().clone();
        if let Some(name) = identifier.name() {
            self.names.insert(name.to_string());
        }
        if let Some(position) = identifier.position() {
            self.next_position = self.next_position.max(position);
        }

        self.by_origin
            .entry(binding.origin().clone())
            .or_default()
            .push(self.bindings.len());
        self.bindings.push(binding);
        identifier
    }

    fn mint(&mut self, identifier: &BindingIdentifier) -> BindingIdentifier {
        match identifier.name() {
            Some(name) => {
                let mut suffix = 1;
                loop {
                    let candidate = format!("{}_{}", name, suffix);
                    if !self.names.contains(&candidate) {
                        return BindingIdentifier::named(candidate);
                    }
                    suffix += 1;
                }
            }
            None => BindingIdentifier::indexed(self.next_position()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::LikeKind;

    fn named(name: &str) -> ParameterOrigin {
        ParameterOrigin::argument(BindingIdentifier::named(name))
    }

    #[test]
    fn same_argument_and_transform_collapses() {
        let mut registry = BindingRegistry::new(0);
        let first = registry.register(ParameterBinding::plain(BindingIdentifier::named("x"), named("x")));
        let second = registry.register(ParameterBinding::plain(BindingIdentifier::named("x"), named("x")));

        assert_eq!(first, second);
        assert_eq!(registry.bindings().len(), 1);
    }

    #[test]
    fn different_transform_gets_synthetic_name() {
        let mut registry = BindingRegistry::new(0);
        registry.register(ParameterBinding::plain(BindingIdentifier::named("x"), named("x")));
        let like = registry.register(ParameterBinding::like(
            BindingIdentifier::named("x"),
            named("x"),
            LikeKind::Containing,
        ));
        let starting = registry.register(ParameterBinding::like(
            BindingIdentifier::named("x"),
            named("x"),
            LikeKind::StartingWith,
        ));

        assert_eq!(like, BindingIdentifier::named("x_1"));
        assert_eq!(starting, BindingIdentifier::named("x_2"));
        assert_eq!(registry.bindings().len(), 3);
        assert!(registry.bindings().iter().all(|b| b.origin() == &named("x")));
    }

    #[test]
    fn positional_conflicts_take_next_free_position() {
        let origin = ParameterOrigin::argument(BindingIdentifier::indexed(1));
        let mut registry = BindingRegistry::new(2);
        registry.register(ParameterBinding::plain(BindingIdentifier::indexed(1), origin.clone()));
        let minted = registry.register(ParameterBinding::like(
            BindingIdentifier::indexed(1),
            origin,
            LikeKind::EndingWith,
        ));

        assert_eq!(minted, BindingIdentifier::indexed(3));
    }
}
