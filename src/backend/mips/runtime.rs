//! Helper routines appended to every MIPS program. They only touch `$a`
//! and `$v` registers, so allocated `$t` registers survive a helper call.

pub const MIPS_DATA: &str = r#"__true: .asciiz "true"
__false: .asciiz "false"
__newline: .asciiz "\n"
"#;

pub const MIPS_ITOA: &str = r#"__itoa:
    move $a2, $a0
    li $a0, 16
    li $v0, 9
    syscall
    addiu $a3, $v0, 15
    sb $zero, 0($a3)
    li $a1, 0
    bgez $a2, __itoa_loop
    li $a1, 1
    subu $a2, $zero, $a2
__itoa_loop:
    li $v1, 10
    divu $a2, $v1
    mfhi $v1
    mflo $a2
    addiu $v1, $v1, 48
    addiu $a3, $a3, -1
    sb $v1, 0($a3)
    bnez $a2, __itoa_loop
    beqz $a1, __itoa_done
    li $v1, 45
    addiu $a3, $a3, -1
    sb $v1, 0($a3)
__itoa_done:
    move $v0, $a3
    jr $ra
"#;

pub const MIPS_BTOA: &str = r#"__btoa:
    la $v0, __false
    beqz $a0, __btoa_done
    la $v0, __true
__btoa_done:
    jr $ra
"#;

pub const MIPS_CONCAT: &str = r#"__concat:
    move $a2, $a0
    move $a3, $a1
    li $v1, 1
__concat_len_lhs:
    lb $v0, 0($a0)
    beqz $v0, __concat_len_rhs
    addiu $v1, $v1, 1
    addiu $a0, $a0, 1
    j __concat_len_lhs
__concat_len_rhs:
    lb $v0, 0($a1)
    beqz $v0, __concat_alloc
    addiu $v1, $v1, 1
    addiu $a1, $a1, 1
    j __concat_len_rhs
__concat_alloc:
    move $a0, $v1
    li $v0, 9
    syscall
    move $a1, $v0
__concat_copy_lhs:
    lb $v1, 0($a2)
    beqz $v1, __concat_copy_rhs
    sb $v1, 0($a1)
    addiu $a1, $a1, 1
    addiu $a2, $a2, 1
    j __concat_copy_lhs
__concat_copy_rhs:
    lb $v1, 0($a3)
    sb $v1, 0($a1)
    beqz $v1, __concat_done
    addiu $a1, $a1, 1
    addiu $a3, $a3, 1
    j __concat_copy_rhs
__concat_done:
    jr $ra
"#;

pub const MIPS_STREQ: &str = r#"__streq:
    lb $a2, 0($a0)
    lb $a3, 0($a1)
    bne $a2, $a3, __streq_no
    beqz $a2, __streq_yes
    addiu $a0, $a0, 1
    addiu $a1, $a1, 1
    j __streq
__streq_no:
    li $v0, 0
    jr $ra
__streq_yes:
    li $v0, 1
    jr $ra
"#;

pub const MIPS_READ: &str = r#"__read:
    li $a0, 256
    li $v0, 9
    syscall
    move $v1, $v0
    move $a0, $v0
    li $a1, 256
    li $v0, 8
    syscall
    move $a0, $v1
__read_trim:
    lb $a1, 0($a0)
    beqz $a1, __read_done
    li $a2, 10
    beq $a1, $a2, __read_cut
    addiu $a0, $a0, 1
    j __read_trim
__read_cut:
    sb $zero, 0($a0)
__read_done:
    move $v0, $v1
    jr $ra
"#;

pub const MIPS_HELPERS: [&str; 5] = [MIPS_ITOA, MIPS_BTOA, MIPS_CONCAT, MIPS_STREQ, MIPS_READ];
