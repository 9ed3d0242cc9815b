use crate::{
    chain::ContractCall,
    units::{
        self,
        AmountError,
    },
};
use alloy::primitives::U256;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OwnerField {
    #[default]
    Amount,
    Count,
}

/// The owner's "create red packet" form.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct OwnerForm {
    pub amount: String,
    pub count: String,
    pub focus: OwnerField,
    pub error: Option<String>,
}

impl OwnerForm {
    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            OwnerField::Amount => OwnerField::Count,
            OwnerField::Count => OwnerField::Amount,
        };
    }

    pub fn push_char(&mut self, c: char) {
        let accepted = match self.focus {
            OwnerField::Amount => c.is_ascii_digit() || (c == '.' && !self.amount.contains('.')),
            OwnerField::Count => c.is_ascii_digit(),
        };
        if accepted {
            self.focused_mut().push(c);
            self.error = None;
        }
    }

    pub fn backspace(&mut self) {
        self.focused_mut().pop();
        self.error = None;
    }

    fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            OwnerField::Amount => &mut self.amount,
            OwnerField::Count => &mut self.count,
        }
    }

    pub fn is_filled(&self) -> bool {
        !self.amount.trim().is_empty() && !self.count.trim().is_empty()
    }

    pub fn can_submit(&self, busy: bool) -> bool {
        self.is_filled() && !busy
    }

    /// `createLuckyMoney(count, amount)` paying exactly `amount`.
    pub fn build_call(&self) -> Result<ContractCall, AmountError> {
        let amount = units::parse_positive_ether(&self.amount)?;
        let count = units::parse_packet_count(&self.count)?;
        Ok(ContractCall::CreateLuckyMoney { count, amount })
    }

    pub fn clear(&mut self) {
        *self = OwnerForm::default();
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GrabButton {
    Open,
    SoldOut,
    Processing,
}

impl GrabButton {
    pub fn is_enabled(self) -> bool {
        matches!(self, GrabButton::Open)
    }
}

/// An unknown count is not treated as sold out.
pub fn grab_button(remaining_count: Option<U256>, busy: bool) -> GrabButton {
    if busy {
        GrabButton::Processing
    } else if remaining_count.is_some_and(|n| n.is_zero()) {
        GrabButton::SoldOut
    } else {
        GrabButton::Open
    }
}

pub fn short_address(address: &alloy::primitives::Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use alloy::primitives::address;

    fn typed(form: &mut OwnerForm, text: &str) {
        for c in text.chars() {
            form.push_char(c);
        }
    }

    #[test]
    fn owner_form__requires_both_fields() {
        let mut form = OwnerForm::default();
        assert!(!form.can_submit(false));
        typed(&mut form, "1.5");
        assert!(!form.can_submit(false));
        form.toggle_focus();
        typed(&mut form, "10");
        assert!(form.can_submit(false));
        assert!(!form.can_submit(true));
    }

    #[test]
    fn owner_form__filters_invalid_keystrokes() {
        // given
        let mut form = OwnerForm::default();

        // when
        typed(&mut form, "1.2.3a");
        form.toggle_focus();
        typed(&mut form, "4.x2");

        // then
        assert_eq!(form.amount, "1.23");
        assert_eq!(form.count, "42");
    }

    #[test]
    fn owner_form__builds_payable_create_call() {
        // given
        let mut form = OwnerForm::default();
        typed(&mut form, "0.5");
        form.toggle_focus();
        typed(&mut form, "5");

        // when
        let call = form.build_call().unwrap();

        // then
        let wei = U256::from(500_000_000_000_000_000u64);
        assert_eq!(call, ContractCall::CreateLuckyMoney {
            count: U256::from(5u64),
            amount: wei,
        });
        assert_eq!(call.value(), wei);
    }

    #[test]
    fn owner_form__rejects_zero_count() {
        let form = OwnerForm {
            amount: "1".into(),
            count: "0".into(),
            ..OwnerForm::default()
        };
        assert_eq!(form.build_call(), Err(AmountError::Zero));
    }

    #[test]
    fn owner_form__clear_resets_inputs_and_focus() {
        let mut form = OwnerForm {
            amount: "1".into(),
            count: "2".into(),
            focus: OwnerField::Count,
            error: Some("x".into()),
        };
        form.clear();
        assert_eq!(form, OwnerForm::default());
    }

    #[test]
    fn grab_button__reflects_pool_and_pending_state() {
        assert_eq!(grab_button(None, false), GrabButton::Open);
        assert_eq!(grab_button(Some(U256::from(3u64)), false), GrabButton::Open);
        assert_eq!(grab_button(Some(U256::ZERO), false), GrabButton::SoldOut);
        assert_eq!(grab_button(Some(U256::ZERO), true), GrabButton::Processing);
        assert!(!GrabButton::SoldOut.is_enabled());
        assert!(!GrabButton::Processing.is_enabled());
    }

    #[test]
    fn short_address__keeps_prefix_and_suffix() {
        let addr = address!("e482752bb054a78858953892b8edcf1039060fe1");
        assert_eq!(short_address(&addr), "0xe482...0fE1");
    }
}
