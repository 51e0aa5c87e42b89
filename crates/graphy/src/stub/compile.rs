use std::{collections::HashMap, sync::Arc};

use async_graphql_parser::{
    types::{
        Directive, DocumentOperations, Field, FragmentDefinition, OperationDefinition, Selection,
        SelectionSet as ParsedSelectionSet,
    },
    Pos, Positioned,
};
use async_graphql_value::{Name, Value};
use fxhash::FxHashSet;

use super::{
    CompileError, Condition, FieldNode, FieldTarget, RequestStub, SelectionSet, TypeCondition, VariableDefinition,
};
use crate::{
    limits::ComplexityScorer,
    operation::{OperationKind, Operations},
    registry::{TypeDescriptor, TypeKind, TypeRegistry},
    types::{OutputType, TypeRef},
};

type CompileResult<T> = Result<T, CompileError>;

pub(crate) struct CompileOptions<'a> {
    pub(crate) registry: &'a TypeRegistry,
    pub(crate) operations: &'a Operations,
    pub(crate) scorer: &'a dyn ComplexityScorer,
    pub(crate) list_size_estimate: usize,
}

pub(crate) fn compile(options: &CompileOptions<'_>, query: &str, operation_name: Option<&str>) -> CompileResult<RequestStub> {
    let document = async_graphql_parser::parse_query(query)?;
    let fragments = document.fragments;

    let (name, operation) = select_operation(document.operations, operation_name)?;
    let OperationDefinition {
        ty,
        variable_definitions,
        selection_set,
        ..
    } = operation.node;
    let kind = OperationKind::from(ty);

    let variables = variable_definitions
        .into_iter()
        .map(|Positioned { pos, node }| VariableDefinition {
            name: node.name.node,
            ty: node.var_type.node,
            default: node.default_value.map(|value| value.node),
            pos,
        })
        .collect::<Vec<_>>();

    let mut compiler = Compiler {
        options,
        fragments: &fragments,
        declared: variables.iter().map(|variable| variable.name.clone()).collect(),
        fragment_stack: Vec::new(),
    };

    let selection_set = compiler.compile_selection_set(&Parent::Root(kind), &selection_set)?;

    if kind == OperationKind::Subscription {
        let count = selection_set.fields.len();
        if count != 1 {
            return Err(CompileError::SubscriptionRootFields {
                name: name.clone().unwrap_or_else(|| "<anonymous>".to_string()),
                count,
                pos: operation.pos,
            });
        }
    }

    tracing::debug!(
        "Compiled {kind} {} with {} root fields",
        name.as_deref().unwrap_or("<anonymous>"),
        selection_set.fields.len()
    );

    Ok(RequestStub {
        kind,
        name,
        variables,
        selection_set,
    })
}

fn select_operation(
    operations: DocumentOperations,
    operation_name: Option<&str>,
) -> CompileResult<(Option<String>, Positioned<OperationDefinition>)> {
    match (operations, operation_name) {
        (DocumentOperations::Single(operation), None) => Ok((None, operation)),
        (DocumentOperations::Single(_), Some(name)) => Err(CompileError::UnknownOperation(name.to_string())),
        (DocumentOperations::Multiple(mut operations), Some(name)) => operations
            .remove(name)
            .map(|operation| (Some(name.to_string()), operation))
            .ok_or_else(|| CompileError::UnknownOperation(name.to_string())),
        (DocumentOperations::Multiple(operations), None) => {
            if operations.len() > 1 {
                return Err(CompileError::AmbiguousOperation);
            }
            operations
                .into_iter()
                .next()
                .map(|(name, operation)| (Some(name.to_string()), operation))
                .ok_or(CompileError::MissingOperation)
        }
    }
}

/// Type a selection set applies to.
#[derive(Clone)]
enum Parent {
    Root(OperationKind),
    Type(Arc<TypeDescriptor>),
}

impl Parent {
    fn name(&self) -> &str {
        match self {
            Parent::Root(kind) => kind.root_type_name(),
            Parent::Type(descriptor) => descriptor.name(),
        }
    }
}

struct Compiler<'a, 'doc> {
    options: &'a CompileOptions<'a>,
    fragments: &'doc HashMap<Name, Positioned<FragmentDefinition>>,
    declared: FxHashSet<Name>,
    fragment_stack: Vec<Name>,
}

impl<'a, 'doc> Compiler<'a, 'doc> {
    fn compile_selection_set(
        &mut self,
        parent: &Parent,
        selection_set: &'doc Positioned<ParsedSelectionSet>,
    ) -> CompileResult<SelectionSet> {
        let mut fields = Vec::new();
        self.collect_fields(parent, &selection_set.node, None, &[], &mut fields)?;

        for (index, field) in fields.iter().enumerate() {
            let duplicate = fields[..index].iter().any(|previous| {
                previous.response_key == field.response_key && overlap(&previous.condition, &field.condition)
            });
            if duplicate {
                return Err(CompileError::DuplicateAlias {
                    alias: field.response_key.to_string(),
                    parent: parent.name().to_string(),
                    pos: field.pos,
                });
            }
        }

        Ok(SelectionSet { fields })
    }

    /// Flattens fragments into `fields`, recording their type conditions and directives.
    fn collect_fields(
        &mut self,
        parent: &Parent,
        selection_set: &'doc ParsedSelectionSet,
        condition: Option<&TypeCondition>,
        directives: &[Condition],
        fields: &mut Vec<FieldNode>,
    ) -> CompileResult<()> {
        for selection in &selection_set.items {
            match &selection.node {
                Selection::Field(field) => {
                    let node = self.compile_field(parent, field, condition.cloned(), directives)?;
                    fields.push(node);
                }
                Selection::FragmentSpread(spread) => {
                    let name = &spread.node.fragment_name.node;
                    let fragment = self.fragments.get(name).ok_or_else(|| CompileError::UnknownFragment {
                        name: name.to_string(),
                        pos: spread.pos,
                    })?;

                    if self.fragment_stack.contains(name) {
                        return Err(CompileError::FragmentCycle {
                            name: name.to_string(),
                            pos: spread.pos,
                        });
                    }

                    let mut directives = directives.to_vec();
                    directives.extend(self.conditions(&spread.node.directives)?);

                    let on = &fragment.node.type_condition.node.on;
                    let (parent, condition) = self.narrow(parent, &on.node, on.pos, condition)?;

                    self.fragment_stack.push(name.clone());
                    self.collect_fields(
                        &parent,
                        &fragment.node.selection_set.node,
                        condition.as_ref(),
                        &directives,
                        fields,
                    )?;
                    self.fragment_stack.pop();
                }
                Selection::InlineFragment(fragment) => {
                    let mut directives = directives.to_vec();
                    directives.extend(self.conditions(&fragment.node.directives)?);

                    let (parent, condition) = match &fragment.node.type_condition {
                        Some(type_condition) => {
                            let on = &type_condition.node.on;
                            self.narrow(parent, &on.node, on.pos, condition)?
                        }
                        None => (parent.clone(), condition.cloned()),
                    };

                    self.collect_fields(
                        &parent,
                        &fragment.node.selection_set.node,
                        condition.as_ref(),
                        &directives,
                        fields,
                    )?;
                }
            }
        }

        Ok(())
    }

    /// Applies a fragment type condition to the current parent.
    fn narrow(
        &self,
        parent: &Parent,
        on: &Name,
        pos: Pos,
        current: Option<&TypeCondition>,
    ) -> CompileResult<(Parent, Option<TypeCondition>)> {
        if on.as_str() == parent.name() {
            return Ok((parent.clone(), current.cloned()));
        }

        let candidates = match parent {
            Parent::Type(descriptor) => match descriptor.kind() {
                TypeKind::Union(fields) => fields.fields().iter().map(|field| field.ty().named_type()).collect(),
                TypeKind::Interface(shape) => shape.implementors().to_vec(),
                _ => Vec::new(),
            },
            Parent::Root(_) => Vec::new(),
        };

        for candidate in candidates {
            let descriptor = self.options.registry.descriptor(candidate)?;
            if descriptor.name() == on.as_str() {
                let condition = TypeCondition {
                    type_id: descriptor.type_id(),
                };
                return Ok((Parent::Type(descriptor), Some(condition)));
            }
        }

        Err(CompileError::InvalidTypeCondition {
            condition: on.to_string(),
            parent: parent.name().to_string(),
            pos,
        })
    }

    fn compile_field(
        &mut self,
        parent: &Parent,
        field: &'doc Positioned<Field>,
        condition: Option<TypeCondition>,
        inherited: &[Condition],
    ) -> CompileResult<FieldNode> {
        let Positioned { pos, node } = field;
        let name = node.name.node.clone();

        let mut directives = inherited.to_vec();
        directives.extend(self.conditions(&node.directives)?);

        for (_, value) in &node.arguments {
            self.check_variables(&value.node, value.pos)?;
        }

        let unknown_argument = |argument: &Positioned<Name>| CompileError::UnknownArgument {
            argument: argument.node.to_string(),
            parent: parent.name().to_string(),
            field: name.to_string(),
            pos: argument.pos,
        };

        let (target, ty) = if name.as_str() == "__typename" {
            if let Some((argument, _)) = node.arguments.first() {
                return Err(unknown_argument(argument));
            }
            (FieldTarget::Typename, <String as OutputType>::type_ref())
        } else {
            let unknown_field = || CompileError::UnknownField {
                field: name.to_string(),
                parent: parent.name().to_string(),
                pos: *pos,
            };

            match parent {
                Parent::Root(kind) => {
                    let operation = self.options.operations.get(*kind, &name).ok_or_else(unknown_field)?;
                    let allowed = operation.argument_names();
                    if let Some((argument, _)) = node
                        .arguments
                        .iter()
                        .find(|(argument, _)| !allowed.contains(&argument.node.as_str()))
                    {
                        return Err(unknown_argument(argument));
                    }
                    (FieldTarget::Operation(operation.clone()), operation.output().clone())
                }
                Parent::Type(descriptor) => {
                    if let Some((argument, _)) = node.arguments.first() {
                        return Err(unknown_argument(argument));
                    }
                    match descriptor.kind() {
                        TypeKind::Object(fields) => {
                            let index = fields.position(&name).ok_or_else(unknown_field)?;
                            let target = FieldTarget::Field {
                                owner: descriptor.clone(),
                                index,
                            };
                            (target, fields.fields()[index].ty().clone())
                        }
                        TypeKind::Interface(shape) => {
                            let field = shape.get(&name).ok_or_else(unknown_field)?;
                            (FieldTarget::InterfaceField, field.ty().clone())
                        }
                        _ => return Err(unknown_field()),
                    }
                }
            }
        };

        let descriptor = self.options.registry.descriptor(ty.named_type())?;
        let has_selection = !node.selection_set.node.items.is_empty();

        let selection_set = if is_leaf(&ty, &descriptor) {
            if has_selection {
                return Err(CompileError::UnexpectedSelection {
                    field: name.to_string(),
                    ty: descriptor.name().to_string(),
                    pos: *pos,
                });
            }
            SelectionSet::default()
        } else {
            if !has_selection {
                return Err(CompileError::MissingSelection {
                    field: name.to_string(),
                    ty: descriptor.name().to_string(),
                    pos: *pos,
                });
            }
            self.compile_selection_set(&Parent::Type(descriptor), &node.selection_set)?
        };

        let complexity = match target {
            FieldTarget::Typename => 0,
            _ => {
                let item = self
                    .options
                    .scorer
                    .score_field(parent.name(), &name)
                    .saturating_add(selection_set.complexity());
                if ty.is_list() {
                    self.options.scorer.score_list(item, self.options.list_size_estimate)
                } else {
                    item
                }
            }
        };

        Ok(FieldNode {
            response_key: node.alias.as_ref().map_or_else(|| name.clone(), |alias| alias.node.clone()),
            aliased: node.alias.is_some(),
            name,
            pos: *pos,
            condition,
            directives,
            arguments: node
                .arguments
                .iter()
                .map(|(name, value)| (name.node.clone(), value.node.clone()))
                .collect(),
            target,
            ty,
            selection_set,
            complexity,
        })
    }

    fn conditions(&self, directives: &[Positioned<Directive>]) -> CompileResult<Vec<Condition>> {
        let mut conditions = Vec::with_capacity(directives.len());

        for Positioned { pos, node } in directives {
            let name = node.name.node.as_str();
            let make = match name {
                "skip" => Condition::Skip,
                "include" => Condition::Include,
                _ => {
                    return Err(CompileError::UnknownDirective {
                        name: name.to_string(),
                        pos: *pos,
                    })
                }
            };

            let value = node
                .arguments
                .iter()
                .find(|(argument, _)| argument.node.as_str() == "if")
                .map(|(_, value)| value)
                .ok_or_else(|| CompileError::MissingDirectiveArgument {
                    name: name.to_string(),
                    pos: *pos,
                })?;

            self.check_variables(&value.node, value.pos)?;
            conditions.push(make(value.node.clone()));
        }

        Ok(conditions)
    }

    fn check_variables(&self, value: &Value, pos: Pos) -> CompileResult<()> {
        match value {
            Value::Variable(name) if !self.declared.contains(name) => Err(CompileError::UndefinedVariable {
                name: name.to_string(),
                pos,
            }),
            Value::List(items) => items.iter().try_for_each(|item| self.check_variables(item, pos)),
            Value::Object(fields) => fields.values().try_for_each(|item| self.check_variables(item, pos)),
            _ => Ok(()),
        }
    }
}

/// Whether two fields with the same response key can both apply to a value.
fn overlap(left: &Option<TypeCondition>, right: &Option<TypeCondition>) -> bool {
    match (left, right) {
        (Some(left), Some(right)) => left.type_id == right.type_id,
        _ => true,
    }
}

/// Scalars, enums and maps are serialized without a selection set.
fn is_leaf(ty: &TypeRef, descriptor: &TypeDescriptor) -> bool {
    match ty {
        TypeRef::Named { .. } => descriptor.is_leaf(),
        TypeRef::List { item, .. } => is_leaf(item, descriptor),
        TypeRef::Map { .. } => true,
    }
}
