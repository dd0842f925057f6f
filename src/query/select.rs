use std::str::FromStr;

use sea_orm::sea_query::{Alias, Expr, Query};
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, Select, Value as SqlValue};

use crate::predicate::{CollectionLink, FieldPath, Predicate, PredicateError};
use crate::value::Value;

use super::Filterable;

impl<E> Filterable for Select<E>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    fn filter_by(self, predicate: &Predicate) -> Result<Self, PredicateError> {
        Ok(QueryFilter::filter(self, to_condition::<E>(predicate)?))
    }

    fn none(self) -> Self {
        QueryFilter::filter(self, never())
    }
}

/// Compile a predicate into a sea-orm condition over entity `E`.
///
/// Field paths must name columns of `E` directly. Collection predicates need
/// a [`CollectionLink`] and become `parent_key IN (SELECT foreign_key ...)`
/// sub-queries; their item predicates may only use columns of the item table.
///
/// Negations are pushed down to the comparisons so the SQL keeps
/// two-valued logic: `NOT (col = v)` becomes `col <> v OR col IS NULL`,
/// matching [`Predicate::evaluate`] on rows where `col` is null.
///
/// # Errors
/// Returns `UnknownColumn` for paths that are not columns of `E` and
/// `UnsupportedExpressionKind` for shapes that have no SQL rendering here.
pub fn to_condition<E>(predicate: &Predicate) -> Result<Condition, PredicateError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    compile(predicate, false, &|leaf, negated| match leaf {
        Predicate::Eq { path, value } => {
            let column = column::<E>(path)?;
            Ok(match (value, negated) {
                (Value::Null, false) => Condition::all().add(column.is_null()),
                (Value::Null, true) => Condition::all().add(column.is_not_null()),
                (value, false) => Condition::all().add(column.eq(sql_value(value))),
                (value, true) => Condition::any()
                    .add(column.ne(sql_value(value)))
                    .add(column.is_null()),
            })
        }
        Predicate::Any {
            collection,
            item,
            link,
        } => {
            let link = link.as_ref().ok_or_else(|| {
                PredicateError::UnsupportedExpressionKind(format!(
                    "collection '{collection}' has no table link"
                ))
            })?;
            if collection.single().is_none() {
                return Err(PredicateError::UnsupportedExpressionKind(format!(
                    "collection '{collection}' is not on the queried entity"
                )));
            }

            let parent_key = column_named::<E>(&link.parent_key)?;
            let items = Query::select()
                .column(Alias::new(&link.foreign_key))
                .from(Alias::new(&link.table))
                .cond_where(item_condition(link, item)?)
                .and_where(Expr::col(Alias::new(&link.foreign_key)).is_not_null())
                .to_owned();

            Ok(Condition::all().add(if negated {
                parent_key.not_in_subquery(items)
            } else {
                parent_key.in_subquery(items)
            }))
        }
        _ => Err(PredicateError::UnsupportedExpressionKind(
            "structural predicate passed as a comparison".to_string(),
        )),
    })
}

fn item_condition(link: &CollectionLink, predicate: &Predicate) -> Result<Condition, PredicateError> {
    compile(predicate, false, &|leaf, negated| match leaf {
        Predicate::Eq { path, value } => {
            let name = path.single().ok_or_else(|| {
                PredicateError::UnsupportedExpressionKind(format!(
                    "'{path}' is not a column of table '{}'",
                    link.table
                ))
            })?;
            let column = || Expr::col((Alias::new(&link.table), Alias::new(name)));
            Ok(match (value, negated) {
                (Value::Null, false) => Condition::all().add(column().is_null()),
                (Value::Null, true) => Condition::all().add(column().is_not_null()),
                (value, false) => Condition::all().add(column().eq(sql_value(value))),
                (value, true) => Condition::any()
                    .add(column().ne(sql_value(value)))
                    .add(column().is_null()),
            })
        }
        Predicate::Any { collection, .. } => Err(PredicateError::UnsupportedExpressionKind(
            format!("nested collection '{collection}' inside table '{}'", link.table),
        )),
        _ => Err(PredicateError::UnsupportedExpressionKind(
            "structural predicate passed as a comparison".to_string(),
        )),
    })
}

/// Shared walk over the structural nodes. `leaf` renders `Eq` and `Any`,
/// negated when `negated` is set; `Not` is folded in with De Morgan.
fn compile<L>(predicate: &Predicate, negated: bool, leaf: &L) -> Result<Condition, PredicateError>
where
    L: Fn(&Predicate, bool) -> Result<Condition, PredicateError>,
{
    match predicate {
        Predicate::Const(value) if *value != negated => Ok(Condition::all()),
        Predicate::Const(_) => Ok(never()),
        Predicate::Not(inner) => compile(inner, !negated, leaf),
        Predicate::And(predicates) => group(predicates, negated, !negated, leaf),
        Predicate::Or(predicates) => group(predicates, negated, negated, leaf),
        Predicate::Eq { .. } | Predicate::Any { .. } => leaf(predicate, negated),
    }
}

/// Conjunction when `all`, disjunction otherwise. An empty disjunction
/// matches nothing.
fn group<L>(
    predicates: &[Predicate],
    negated: bool,
    all: bool,
    leaf: &L,
) -> Result<Condition, PredicateError>
where
    L: Fn(&Predicate, bool) -> Result<Condition, PredicateError>,
{
    if predicates.is_empty() {
        return Ok(if all { Condition::all() } else { never() });
    }

    let start = if all { Condition::all() } else { Condition::any() };
    predicates.iter().try_fold(start, |condition, p| {
        Ok(condition.add(compile(p, negated, leaf)?))
    })
}

fn column<E>(path: &FieldPath) -> Result<E::Column, PredicateError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    let name = path.single().ok_or_else(|| {
        PredicateError::UnsupportedExpressionKind(format!(
            "'{path}' is not a column of the queried entity"
        ))
    })?;
    column_named::<E>(name)
}

fn column_named<E>(name: &str) -> Result<E::Column, PredicateError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    E::Column::from_str(name).map_err(|_| PredicateError::UnknownColumn(name.to_string()))
}

fn never() -> Condition {
    Condition::all().add(Expr::val(1).eq(0))
}

fn sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::BigInt(None),
        Value::Bool(b) => SqlValue::from(*b),
        Value::Int(i) => SqlValue::from(*i),
        Value::Float(x) => SqlValue::from(*x),
        Value::Uuid(u) => SqlValue::from(*u),
        Value::Text(s) => SqlValue::from(s.clone()),
    }
}
