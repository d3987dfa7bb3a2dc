//! Edge detection for one boolean control

use std::fmt;

use crate::controller::{Control, ControlSample};

/// The edge kinds a binding listens to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EdgeSet {
    pub pressed: bool,
    pub released: bool,
    pub toggled: bool,
}

impl EdgeSet {
    pub fn on_press() -> Self {
        Self {
            pressed: true,
            ..Self::default()
        }
    }

    pub fn on_release() -> Self {
        Self {
            released: true,
            ..Self::default()
        }
    }

    /// Press and release, the usual pair for a momentary action.
    pub fn on_hold() -> Self {
        Self {
            pressed: true,
            released: true,
            toggled: false,
        }
    }

    pub fn on_toggle() -> Self {
        Self {
            toggled: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.pressed || self.released || self.toggled)
    }

    pub fn overlaps(&self, other: &EdgeSet) -> bool {
        (self.pressed && other.pressed)
            || (self.released && other.released)
            || (self.toggled && other.toggled)
    }
}

impl fmt::Display for EdgeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (self.pressed, "pressed"),
            (self.released, "released"),
            (self.toggled, "toggled"),
        ]
        .into_iter()
        .filter_map(|(set, name)| set.then_some(name))
        .collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// An edge that fired this tick. `Toggled` carries the toggle state after
/// the flip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FiredEdge {
    Pressed,
    Released,
    Toggled { active: bool },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Transition {
    Press,
    Release,
}

/// Watches one control and reports the edges of interest once per tick.
#[derive(Clone, Debug)]
pub struct InputEdgeBinding {
    control: Control,
    edges: EdgeSet,
    toggle_active: bool,
    // Held state seen at the previous poll
    last_held: bool,
}

impl InputEdgeBinding {
    pub fn new(control: Control, edges: EdgeSet) -> Self {
        Self {
            control,
            edges,
            toggle_active: false,
            last_held: false,
        }
    }

    pub fn control(&self) -> Control {
        self.control
    }

    pub fn edges(&self) -> EdgeSet {
        self.edges
    }

    pub fn toggle_active(&self) -> bool {
        self.toggle_active
    }

    pub fn reset_toggle(&mut self) {
        self.toggle_active = false;
    }

    /// Consumes this tick's sample of the control and returns the fired
    /// edges in the order the transitions happened.
    pub fn poll(&mut self, sample: ControlSample) -> Vec<FiredEdge> {
        let transitions = transitions(self.last_held, sample);
        self.last_held = sample.held;

        let mut fired = Vec::with_capacity(transitions.len());
        for transition in transitions {
            match transition {
                Transition::Press => {
                    if self.edges.pressed {
                        fired.push(FiredEdge::Pressed);
                    }
                    if self.edges.toggled {
                        self.toggle_active = !self.toggle_active;
                        fired.push(FiredEdge::Toggled {
                            active: self.toggle_active,
                        });
                    }
                }
                Transition::Release => {
                    if self.edges.released {
                        fired.push(FiredEdge::Released);
                    }
                }
            }
        }
        fired
    }
}

// Transitions alternate starting away from the previous held state and end
// at the current one. A sample with both flags set saw at least two.
fn transitions(was_held: bool, sample: ControlSample) -> Vec<Transition> {
    let first = if was_held {
        Transition::Release
    } else {
        Transition::Press
    };

    let count = match (sample.pressed, sample.released) {
        (false, false) => 0,
        (true, false) | (false, true) => 1,
        (true, true) => {
            if was_held == sample.held {
                2
            } else {
                3
            }
        }
    };

    let mut next = first;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(next);
        next = match next {
            Transition::Press => Transition::Release,
            Transition::Release => Transition::Press,
        };
    }

    // A lone flag names its own transition
    if count == 1 {
        out[0] = if sample.pressed {
            Transition::Press
        } else {
            Transition::Release
        };
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ButtonType;

    fn sample(held: bool, pressed: bool, released: bool) -> ControlSample {
        ControlSample {
            held,
            pressed,
            released,
        }
    }

    fn binding(edges: EdgeSet) -> InputEdgeBinding {
        InputEdgeBinding::new(Control::button(1, ButtonType::X), edges)
    }

    #[test]
    fn press_and_release_fire_once_each() {
        let mut b = binding(EdgeSet::on_hold());
        assert_eq!(b.poll(sample(true, true, false)), vec![FiredEdge::Pressed]);
        assert!(b.poll(sample(true, false, false)).is_empty());
        assert_eq!(b.poll(sample(false, false, true)), vec![FiredEdge::Released]);
        assert!(b.poll(sample(false, false, false)).is_empty());
    }

    #[test]
    fn tap_inside_one_tick_presses_before_release() {
        let mut b = binding(EdgeSet::on_hold());
        assert_eq!(
            b.poll(sample(false, true, true)),
            vec![FiredEdge::Pressed, FiredEdge::Released]
        );
    }

    #[test]
    fn release_and_repress_inside_one_tick_keeps_order() {
        let mut b = binding(EdgeSet::on_hold());
        b.poll(sample(true, true, false));
        assert_eq!(
            b.poll(sample(true, true, true)),
            vec![FiredEdge::Released, FiredEdge::Pressed]
        );
    }

    #[test]
    fn toggle_flips_on_every_press() {
        let mut b = binding(EdgeSet::on_toggle());
        let mut states = Vec::new();
        for _ in 0..3 {
            for fired in b.poll(sample(true, true, false)) {
                states.push(fired);
            }
            assert!(b.poll(sample(false, false, true)).is_empty());
        }
        assert_eq!(
            states,
            vec![
                FiredEdge::Toggled { active: true },
                FiredEdge::Toggled { active: false },
                FiredEdge::Toggled { active: true },
            ]
        );
        assert!(b.toggle_active());

        b.reset_toggle();
        assert!(!b.toggle_active());
    }

    #[test]
    fn release_only_binding_ignores_press() {
        let mut b = binding(EdgeSet::on_release());
        assert!(b.poll(sample(true, true, false)).is_empty());
        assert_eq!(b.poll(sample(false, false, true)), vec![FiredEdge::Released]);
    }

    #[test]
    fn edge_sets_overlap_on_shared_kinds() {
        assert!(EdgeSet::on_hold().overlaps(&EdgeSet::on_release()));
        assert!(!EdgeSet::on_press().overlaps(&EdgeSet::on_release()));
        assert!(EdgeSet::default().is_empty());
        assert_eq!(EdgeSet::on_hold().to_string(), "{pressed, released}");
    }
}
