use crate::{ImportState, Msg, SessionState};

/// Pure update function: applies a message to the run state.
pub fn update(mut state: ImportState, msg: Msg) -> ImportState {
    match msg {
        Msg::ImportStarted { total_rows } => {
            if state.session() != SessionState::Running {
                state.start(total_rows);
            }
        }
        Msg::RowFinished(report) => match state.session() {
            SessionState::Running | SessionState::Cancelling => state.apply_row(report),
            SessionState::Idle | SessionState::Finished => {}
        },
        Msg::Tick { elapsed } => {
            if state.session() == SessionState::Running {
                state.set_elapsed(elapsed);
            }
        }
        Msg::CancelRequested => {
            if state.session() == SessionState::Running {
                state.request_cancel();
            }
        }
        Msg::ImportFinished => match state.session() {
            SessionState::Running | SessionState::Cancelling => state.finish(),
            SessionState::Idle | SessionState::Finished => {}
        },
        Msg::Reset => {
            if state.session() != SessionState::Running {
                state = ImportState::new();
            }
        }
    }
    state
}
