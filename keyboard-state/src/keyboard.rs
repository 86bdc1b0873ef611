//! Keyboard layout notifications
//!
//! The proposed frame travels in `user_info` under [`FRAME_END_KEY`] as a
//! JSON rectangle. Decoding never fails hard: an unknown name is "not a
//! keyboard notification" and a missing or malformed frame is `None`.

use serde_json::{json, Value};
use tracing::debug;

use crate::geometry::Rect;
use crate::notification::{
    Notification, NotificationName, KEYBOARD_WILL_CHANGE_FRAME, KEYBOARD_WILL_HIDE,
};

/// `user_info` key holding the frame the keyboard will settle to
pub const FRAME_END_KEY: &str = "frame_end";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyboardNotificationKind {
    WillChangeFrame,
    WillHide,
}

impl KeyboardNotificationKind {
    pub fn name(&self) -> NotificationName {
        match self {
            Self::WillChangeFrame => KEYBOARD_WILL_CHANGE_FRAME,
            Self::WillHide => KEYBOARD_WILL_HIDE,
        }
    }

    pub fn from_name(name: &NotificationName) -> Option<Self> {
        if *name == KEYBOARD_WILL_CHANGE_FRAME {
            Some(Self::WillChangeFrame)
        } else if *name == KEYBOARD_WILL_HIDE {
            Some(Self::WillHide)
        } else {
            None
        }
    }
}

/// A decoded keyboard layout notification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyboardNotification {
    pub kind: KeyboardNotificationKind,
    pub proposed_frame: Option<Rect>,
}

impl KeyboardNotification {
    pub fn will_change_frame(frame: Rect) -> Self {
        Self {
            kind: KeyboardNotificationKind::WillChangeFrame,
            proposed_frame: Some(frame),
        }
    }

    pub fn will_hide(frame: Option<Rect>) -> Self {
        Self {
            kind: KeyboardNotificationKind::WillHide,
            proposed_frame: frame,
        }
    }

    /// Decode a posted notification
    ///
    /// Returns `None` only when the name is not a keyboard notification.
    pub fn decode(notification: &Notification) -> Option<Self> {
        let kind = KeyboardNotificationKind::from_name(&notification.name)?;
        Some(Self {
            kind,
            proposed_frame: frame_end(&notification.user_info),
        })
    }

    pub fn into_notification(self) -> Notification {
        let user_info = match self.proposed_frame {
            Some(frame) => json!({ FRAME_END_KEY: frame }),
            None => Value::Null,
        };
        Notification::new(self.kind.name(), user_info)
    }
}

/// Read the end frame from a payload, `None` if absent or unusable
pub fn frame_end(user_info: &Value) -> Option<Rect> {
    let Some(raw) = user_info.get(FRAME_END_KEY) else {
        debug!("notification payload has no {}", FRAME_END_KEY);
        return None;
    };

    match serde_json::from_value::<Rect>(raw.clone()) {
        Ok(frame) if is_finite(&frame) => Some(frame),
        Ok(frame) => {
            debug!(?frame, "ignoring non-finite keyboard frame");
            None
        }
        Err(e) => {
            debug!(error = %e, "malformed keyboard frame in payload");
            None
        }
    }
}

fn is_finite(frame: &Rect) -> bool {
    frame.x.is_finite() && frame.y.is_finite() && frame.width.is_finite() && frame.height.is_finite()
}
