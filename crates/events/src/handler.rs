/// Decide and evolve in one step, without persistence.
///
/// Runs `aggregate.handle(command)` and, only if it succeeds, applies every produced
/// event in order. On error the aggregate is untouched. The infra dispatcher does the
/// same thing around an event store; this helper is for tests and inline use.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: storefront_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
