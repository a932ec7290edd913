//! Simple control API methods.
//!
//! A simple control changes one link's status or setting when a tank
//! level or junction pressure crosses a threshold, at a set elapsed time,
//! or at a set time of day.

use crate::error::*;
use crate::types::*;
use crate::Project;

/// ## Simple Control APIs
impl Project {
    /// Adds a simple control. Returns the 1-based control index.
    ///
    /// # Parameters
    /// - `control_type`: trigger kind (see [`ControlType`]).
    /// - `link_index`: the controlled link.
    /// - `setting`: the status (for pipes, 0 = closed / 1 = open) or the
    ///   speed/setting (for pumps and valves) applied when the control
    ///   fires.
    /// - `node_index`: the trigger node for level controls (0 otherwise).
    /// - `level`: the trigger level (m above the node's elevation) for
    ///   level controls, or the trigger time in seconds for the two
    ///   time-based kinds.
    pub fn add_control(
        &mut self,
        control_type: ControlType,
        link_index: i32,
        setting: f64,
        node_index: i32,
        level: f64,
    ) -> Result<i32> {
        let control = self.build_control(control_type, link_index, setting, node_index, level)?;
        self.network.controls.push(control);
        Ok(self.network.controls.len() as i32)
    }

    /// Replaces the parameters of an existing control.
    pub fn set_control(
        &mut self,
        index: i32,
        control_type: ControlType,
        link_index: i32,
        setting: f64,
        node_index: i32,
        level: f64,
    ) -> Result<()> {
        let i = self.control_index(index)?;
        let control = self.build_control(control_type, link_index, setting, node_index, level)?;
        self.network.controls[i - 1] = control;
        Ok(())
    }

    /// Retrieves a control's parameters as
    /// `(type, link, setting, node, level)`.
    pub fn get_control(&self, index: i32) -> Result<(ControlType, i32, f64, i32, f64)> {
        let i = self.control_index(index)?;
        let control = &self.network.controls[i - 1];
        let setting = match control.setting {
            Some(v) => v,
            None => (!control.status.is_closed()) as i32 as f64,
        };
        let level = match control.control_type {
            ControlType::Timer | ControlType::TimeOfDay => control.time as f64,
            _ => control.grade,
        };
        Ok((
            control.control_type,
            control.link as i32,
            setting,
            control.node as i32,
            level,
        ))
    }

    /// Deletes a simple control.
    pub fn delete_control(&mut self, index: i32) -> Result<()> {
        let i = self.control_index(index)?;
        self.network.controls.remove(i - 1);
        Ok(())
    }

    /// Enables or disables a control without deleting it.
    pub fn set_control_enabled(&mut self, index: i32, enabled: bool) -> Result<()> {
        let i = self.control_index(index)?;
        self.network.controls[i - 1].enabled = enabled;
        Ok(())
    }

    fn build_control(
        &self,
        control_type: ControlType,
        link_index: i32,
        setting: f64,
        node_index: i32,
        level: f64,
    ) -> Result<Control> {
        let k = self.link_index(link_index)?;
        let link = self.network.link(k);
        if link.link_type == LinkType::CvPipe {
            return Err(EngineError::new(ERR_CONTROL_CV));
        }
        let node = match control_type {
            ControlType::LowLevel | ControlType::HiLevel => self.node_index(node_index)?,
            _ => 0,
        };
        let (status, stored_setting) = match link.link_type {
            LinkType::Pipe => (
                if setting == 0.0 {
                    LinkStatus::Closed
                } else {
                    LinkStatus::Open
                },
                None,
            ),
            LinkType::Pump => (
                if setting == 0.0 {
                    LinkStatus::Closed
                } else {
                    LinkStatus::Open
                },
                Some(setting),
            ),
            _ => (LinkStatus::Active, Some(setting)),
        };
        let (grade, time) = match control_type {
            ControlType::Timer | ControlType::TimeOfDay => (0.0, level as i64),
            _ => (level, 0),
        };
        Ok(Control {
            control_type,
            link: k,
            status,
            setting: stored_setting,
            node,
            grade,
            time,
            enabled: true,
        })
    }

    fn control_index(&self, index: i32) -> Result<usize> {
        let i = index as usize;
        if index < 1 || i > self.network.controls.len() {
            return Err(EngineError::new(ERR_UNDEF_CONTROL));
        }
        Ok(i)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::test_utils::fixtures::*;
    use rstest::rstest;

    #[rstest]
    fn control_round_trip(mut ph: Project) {
        let p1 = ph.get_link_index("P1").unwrap();
        let t1 = ph.get_node_index("T1").unwrap();
        let c = ph
            .add_control(ControlType::HiLevel, p1, 0.0, t1, 4.5)
            .unwrap();
        let (ctype, link, setting, node, level) = ph.get_control(c).unwrap();
        assert_eq!(ctype, ControlType::HiLevel);
        assert_eq!(link, p1);
        assert_eq!(setting, 0.0);
        assert_eq!(node, t1);
        assert_eq!(level, 4.5);

        ph.set_control(c, ControlType::Timer, p1, 1.0, 0, 7200.0).unwrap();
        let (ctype, _, _, _, level) = ph.get_control(c).unwrap();
        assert_eq!(ctype, ControlType::Timer);
        assert_eq!(level, 7200.0);

        ph.delete_control(c).unwrap();
        assert!(ph.get_control(c).is_err());
    }

    #[rstest]
    fn check_valves_cannot_be_controlled(mut ph: Project) {
        let cv = ph.add_link("CV1", LinkType::CvPipe, "J1", "J2").unwrap();
        let err = ph
            .add_control(ControlType::Timer, cv, 1.0, 0, 0.0)
            .unwrap_err();
        assert_eq!(err.code(), ERR_CONTROL_CV);
    }
}
