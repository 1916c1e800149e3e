use uuid::Uuid;

/**
 * The UUID of the standard Bluetooth GATT Battery Service (0x180F).
 */
pub const BATTERY_SERVICE: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

/**
 * The UUID of the Battery Level characteristic (0x2A19) within the Battery Service.
 * Its value is a single byte holding the charge percentage.
 */
pub const BATTERY_LEVEL_CHARACTERISTIC: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

/**
 * How long (milliseconds) to collect advertisements before presenting the device chooser,
 * unless configured otherwise.
 */
pub const DEFAULT_SCAN_DURATION: u64 = 5000;

/**
 * Capacity of the channels between the session manager and its collaborators.
 */
pub const CHANNEL_CAPACITY: usize = 64;
