//! System trait

/// System trait for processing entities and components
pub trait System {
    /// Summary a run hands back to the frame driver
    type Output;

    /// Run the system
    fn run(&mut self, world: &mut crate::ecs::World) -> Self::Output;
}
