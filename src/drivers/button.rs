//! Debounced poll button.
//!
//! Active-low momentary switch with internal pull-up.  Sampled from the
//! poll loop rather than an ISR: a press only has to be noticed within one
//! loop period, and the level is stable long before that.
//!
//! A press counts once it has read LOW for [`DEBOUNCE_MS`]; it must be
//! released (HIGH for the same time) before another press can count.

const DEBOUNCE_MS: u32 = 50;

pub struct ButtonDriver {
    gpio: i32,
    stable_pressed: bool,
    candidate: bool,
    since_ms: u32,
}

impl ButtonDriver {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            stable_pressed: false,
            candidate: false,
            since_ms: 0,
        }
    }

    /// GPIO pin this button is attached to.
    pub fn gpio(&self) -> i32 {
        self.gpio
    }

    /// Read the pin and run the debouncer.  `true` on a new press.
    pub fn tick(&mut self, now_ms: u32) -> bool {
        let pressed = self.is_pressed_hw();
        self.sample(pressed, now_ms)
    }

    /// Debounce one raw sample.  `true` on the debounced press edge.
    pub fn sample(&mut self, pressed: bool, now_ms: u32) -> bool {
        if pressed != self.candidate {
            self.candidate = pressed;
            self.since_ms = now_ms;
            return false;
        }
        if pressed == self.stable_pressed || now_ms.wrapping_sub(self.since_ms) < DEBOUNCE_MS {
            return false;
        }
        self.stable_pressed = pressed;
        pressed
    }

    /// Configure the pin as a pulled-up input.
    #[cfg(target_os = "espidf")]
    pub fn configure(&self) -> Result<(), i32> {
        use esp_idf_svc::sys::*;

        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << self.gpio,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        // SAFETY: plain register configuration of a pin nothing else owns.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 { Err(ret) } else { Ok(()) }
    }

    #[cfg(target_os = "espidf")]
    fn is_pressed_hw(&self) -> bool {
        // SAFETY: read-only level access on a configured input.
        (unsafe { esp_idf_svc::sys::gpio_get_level(self.gpio) }) == 0
    }

    #[cfg(not(target_os = "espidf"))]
    fn is_pressed_hw(&self) -> bool {
        false
    }
}
