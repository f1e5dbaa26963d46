//! Dependency ordering for field sets.
//!
//! A depth-first topological sort: each field's dependencies are placed
//! before it, fields without dependencies keep their input order, and a
//! three-state marker detects cycles.

use std::collections::HashMap;

use crate::error::{ExtractionError, Result};
use crate::types::field::FieldSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Order `fields` so every field comes after everything it depends on.
///
/// # Errors
///
/// - `MissingDependency` if a `depends_on` entry names no field in the set
/// - `CyclicDependency` (with the cycle path) if the graph has a cycle
/// - `SpecValidation` if two fields share a name
pub fn order_fields(fields: &[FieldSpec]) -> Result<Vec<&FieldSpec>> {
    let mut index = HashMap::with_capacity(fields.len());
    for (i, field) in fields.iter().enumerate() {
        if index.insert(field.name.as_str(), i).is_some() {
            return Err(ExtractionError::spec(&field.name, "duplicate field name"));
        }
    }

    let mut resolver = Resolver {
        fields,
        index,
        marks: vec![Mark::Unvisited; fields.len()],
        path: Vec::new(),
        order: Vec::with_capacity(fields.len()),
    };

    for i in 0..fields.len() {
        resolver.visit(i)?;
    }

    Ok(resolver.order)
}

struct Resolver<'a> {
    fields: &'a [FieldSpec],
    index: HashMap<&'a str, usize>,
    marks: Vec<Mark>,
    path: Vec<usize>,
    order: Vec<&'a FieldSpec>,
}

impl<'a> Resolver<'a> {
    fn visit(&mut self, i: usize) -> Result<()> {
        match self.marks[i] {
            Mark::Done => return Ok(()),
            Mark::InProgress => return Err(self.cycle_error(i)),
            Mark::Unvisited => {}
        }

        self.marks[i] = Mark::InProgress;
        self.path.push(i);

        let fields = self.fields;
        for dependency in &fields[i].depends_on {
            let Some(&j) = self.index.get(dependency.as_str()) else {
                return Err(ExtractionError::MissingDependency {
                    field: fields[i].name.clone(),
                    dependency: dependency.clone(),
                });
            };
            self.visit(j)?;
        }

        self.path.pop();
        self.marks[i] = Mark::Done;
        self.order.push(&fields[i]);
        Ok(())
    }

    fn cycle_error(&self, revisited: usize) -> ExtractionError {
        let start = self
            .path
            .iter()
            .position(|&i| i == revisited)
            .unwrap_or(0);
        let mut cycle: Vec<String> = self.path[start..]
            .iter()
            .map(|&i| self.fields[i].name.clone())
            .collect();
        cycle.push(self.fields[revisited].name.clone());
        ExtractionError::CyclicDependency { cycle }
    }
}
